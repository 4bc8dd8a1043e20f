use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{AtomId, SiteId, Timestamp, MAX_TIMESTAMP};

/// Highest timestamp observed per site.
///
/// A site with no entry has contributed nothing yet, which is distinct from having contributed
/// an atom at timestamp `0`. Entries only ever grow.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector {
    entries: BTreeMap<SiteId, Timestamp>,
}

impl VersionVector {
    /// Create a new empty version vector.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Highest timestamp observed for `site`, if any.
    pub fn get(&self, site: SiteId) -> Option<Timestamp> {
        self.entries.get(&site).copied()
    }

    /// Raise the counter for `id.site` to at least `id.timestamp`.
    pub fn observe(&mut self, id: AtomId) {
        self.entries
            .entry(id.site)
            .and_modify(|t| *t = (*t).max(id.timestamp))
            .or_insert(id.timestamp);
    }

    /// Whether the counter for `id.site` has reached `id.timestamp`.
    pub fn covers(&self, id: &AtomId) -> bool {
        self.get(id.site).is_some_and(|t| t >= id.timestamp)
    }

    /// Advance the counter for `site` by one and return the new value.
    ///
    /// A site without an entry starts at `0`. Fails without recording anything once the
    /// counter would pass [`MAX_TIMESTAMP`].
    pub fn next_timestamp(&mut self, site: SiteId) -> Result<Timestamp> {
        let next = match self.get(site) {
            None => 0,
            Some(t) if t >= MAX_TIMESTAMP => {
                return Err(Error::MalformedAtom(format!(
                    "site {site} has exhausted its timestamps at {t}"
                )))
            }
            Some(t) => t + 1,
        };
        self.entries.insert(site, next);
        Ok(next)
    }

    /// Pointwise maximum.
    pub fn merge(&mut self, other: &VersionVector) {
        for (&site, &timestamp) in &other.entries {
            self.observe(AtomId::new(site, timestamp));
        }
    }

    /// Whether every entry of `other` is covered by this vector.
    pub fn dominates(&self, other: &VersionVector) -> bool {
        other
            .entries
            .iter()
            .all(|(&site, &timestamp)| self.covers(&AtomId::new(site, timestamp)))
    }

    /// Largest timestamp observed across all sites.
    pub fn max_timestamp(&self) -> Option<Timestamp> {
        self.entries.values().copied().max()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries ordered by site.
    pub fn entries(&self) -> impl Iterator<Item = (SiteId, Timestamp)> + '_ {
        self.entries.iter().map(|(&site, &timestamp)| (site, timestamp))
    }
}

impl FromIterator<(SiteId, Timestamp)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (SiteId, Timestamp)>>(iter: I) -> Self {
        let mut vector = VersionVector::new();
        for (site, timestamp) in iter {
            vector.observe(AtomId::new(site, timestamp));
        }
        vector
    }
}

/// The local replica's minting identity plus its version vector.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurrentVersion {
    /// Site new local atoms are minted under.
    pub current_site: Option<SiteId>,
    /// Site attributed to replayed edits of another replica's log.
    pub remote_site: Option<SiteId>,
    pub vector: VersionVector,
}

impl CurrentVersion {
    pub fn new(site: SiteId) -> Self {
        Self {
            current_site: Some(site),
            remote_site: None,
            vector: VersionVector::new(),
        }
    }

    /// Timestamp for the next minted atom without recording it.
    ///
    /// Strictly greater than anything observed from any site and than the cause, so a fresh
    /// atom always sorts ahead of the siblings it was created after.
    pub fn peek_timestamp(&self, cause: Option<&AtomId>) -> Timestamp {
        let after_vector = self.vector.max_timestamp().map_or(0, |t| t.saturating_add(1));
        let after_cause = cause.map_or(0, |c| c.timestamp.saturating_add(1));
        after_vector.max(after_cause)
    }
}
