use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-site timestamp. Sites only ever increase their own counter.
pub type Timestamp = u64;

/// Largest timestamp accepted on the wire (2^53 - 1), so ids survive a trip through JSON
/// consumers that store numbers as doubles.
pub const MAX_TIMESTAMP: Timestamp = (1 << 53) - 1;

/// Version of the sibling ordering rule in [`sibling_order`].
///
/// Persisted weaves are only compatible with replicas running the same rule.
pub const SIBLING_ORDER_VERSION: u32 = 1;

/// Unique identifier for a site (an independent replica minting its own atoms).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u32);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier for an atom.
///
/// `Ord` is the natural total order: timestamp first, site as tie-break. Sibling placement
/// inside the weave uses [`sibling_order`] instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AtomId {
    pub site: SiteId,
    pub timestamp: Timestamp,
}

impl AtomId {
    pub const fn new(site: SiteId, timestamp: Timestamp) -> Self {
        Self { site, timestamp }
    }

    /// Reject ids that could not have been minted by a well-behaved site.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp > MAX_TIMESTAMP {
            return Err(Error::MalformedAtom(format!(
                "timestamp {} of {self} exceeds {MAX_TIMESTAMP}",
                self.timestamp
            )));
        }
        Ok(())
    }
}

impl Ord for AtomId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, self.site).cmp(&(other.timestamp, other.site))
    }
}

impl PartialOrd for AtomId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.site, self.timestamp)
    }
}

/// Order of two atoms sharing the same cause: newer timestamp first, lower site first on ties.
///
/// Every replica must apply exactly this rule; see [`SIBLING_ORDER_VERSION`].
pub fn sibling_order(a: &AtomId, b: &AtomId) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.site.cmp(&b.site))
}
