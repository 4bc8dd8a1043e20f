//! The seam between a weave and the transport/session layer around it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::atom::{Atom, HashedAtom};
use crate::batch::{AddResult, AtomBatch, BatchSummary};
use crate::config::WeaveConfig;
use crate::error::{Error, Result};
use crate::ids::{AtomId, SiteId};
use crate::traits::{AcceptAll, SnapshotStore, Validator};
use crate::version_vector::{CurrentVersion, VersionVector};
use crate::weave::Weave;

/// Persisted or transferred form of a weave: the linearization plus the version vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<O> {
    pub atoms: Vec<Atom<O>>,
    pub version: VersionVector,
}

impl<O> Snapshot<O> {
    pub fn empty() -> Self {
        Self {
            atoms: Vec::new(),
            version: VersionVector::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl<O: Serialize> Snapshot<O> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<O: DeserializeOwned> Snapshot<O> {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::CorruptSnapshot(e.to_string()))
    }
}

/// One replica's weave, minting identity, and settings.
///
/// Single owner: callers serialize all mutation. Remote atoms rejected for a missing cause
/// are handed back to the caller to buffer; nothing is retried here.
#[derive(Debug)]
pub struct StateStore<O, V = AcceptAll> {
    weave: Weave<O, V>,
    version: CurrentVersion,
    config: WeaveConfig,
}

impl<O: Clone> StateStore<O, AcceptAll> {
    /// An empty replica with default settings.
    pub fn new(site: SiteId) -> Self {
        Self {
            weave: Weave::new(),
            version: CurrentVersion::new(site),
            config: WeaveConfig::default(),
        }
    }
}

impl<O, V> StateStore<O, V>
where
    O: Clone,
    V: Validator<O>,
{
    /// Build a replica for `site`, replaying `snapshot` when one is given.
    ///
    /// A snapshot whose atoms do not all insert cleanly, or whose version vector does not cover
    /// its own atoms, is rejected as corrupt.
    pub fn init(
        site: SiteId,
        snapshot: Option<Snapshot<O>>,
        validator: V,
        config: WeaveConfig,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(configured) = config.site {
            if configured != site {
                return Err(Error::InvalidConfig(format!(
                    "configured site {configured} does not match replica site {site}"
                )));
            }
        }

        let mut weave = Weave::with_validator(validator);
        let mut version = CurrentVersion::new(site);

        if let Some(snapshot) = snapshot {
            for atom in snapshot.atoms {
                let id = atom.id;
                match weave.insert(atom) {
                    Ok(AddResult::Added(_)) => version.vector.observe(id),
                    Ok(AddResult::Rejected(rejected)) => {
                        return Err(Error::CorruptSnapshot(format!(
                            "atom {id} rejected on load: {:?}",
                            rejected.reason
                        )))
                    }
                    Err(e) => return Err(Error::CorruptSnapshot(format!("atom {id}: {e}"))),
                }
            }
            for (entry_site, timestamp) in snapshot.version.entries() {
                AtomId::new(entry_site, timestamp).validate().map_err(|e| {
                    Error::CorruptSnapshot(format!("version vector entry for site {entry_site}: {e}"))
                })?;
            }
            if !snapshot.version.dominates(&version.vector) {
                return Err(Error::CorruptSnapshot(
                    "version vector does not cover the snapshot's atoms".into(),
                ));
            }
            version.vector.merge(&snapshot.version);
        }

        info!(%site, atoms = weave.len(), "weave initialized");
        Ok(Self {
            weave,
            version,
            config,
        })
    }

    /// [`StateStore::init`] from whatever `store` currently holds.
    pub fn open<S>(site: SiteId, store: &S, validator: V, config: WeaveConfig) -> Result<Self>
    where
        S: SnapshotStore<O>,
    {
        Self::init(site, store.load()?, validator, config)
    }

    /// Feed remote atoms through the weave in the given order.
    pub fn apply_remote(&mut self, atoms: impl IntoIterator<Item = Atom<O>>) -> AtomBatch<O> {
        let batch = self.weave.insert_batch(atoms);
        self.observe_added(&batch);
        log_summary(&batch.summary());
        batch
    }

    /// Like [`StateStore::apply_remote`], checking each atom against its declared digest when
    /// checksum verification is enabled.
    pub fn apply_remote_hashed(
        &mut self,
        atoms: impl IntoIterator<Item = HashedAtom<O>>,
    ) -> AtomBatch<O>
    where
        O: Serialize,
    {
        if !self.config.verify_checksums {
            return self.apply_remote(atoms.into_iter().map(|hashed| hashed.atom));
        }

        let mut batch = AtomBatch::new();
        for HashedAtom { atom, hash } in atoms {
            let id = atom.id;
            batch.record(id, self.weave.insert_hashed(atom, &hash));
        }
        self.observe_added(&batch);
        log_summary(&batch.summary());
        batch
    }

    /// Mint a new atom under the current site and insert it.
    pub fn mint(&mut self, cause: Option<AtomId>, payload: O) -> Result<AddResult<O>> {
        let site = self
            .version
            .current_site
            .ok_or_else(|| Error::InvalidConfig("no current site to mint under".into()))?;
        self.mint_as(site, cause, payload)
    }

    /// Mint under the remote site, for replaying another replica's edits as that replica.
    pub fn mint_remote(&mut self, cause: Option<AtomId>, payload: O) -> Result<AddResult<O>> {
        let site = self
            .version
            .remote_site
            .ok_or_else(|| Error::InvalidConfig("no remote site set".into()))?;
        self.mint_as(site, cause, payload)
    }

    fn mint_as(&mut self, site: SiteId, cause: Option<AtomId>, payload: O) -> Result<AddResult<O>> {
        let timestamp = self.version.peek_timestamp(cause.as_ref());
        let atom = Atom::new(AtomId::new(site, timestamp), cause, payload);
        let result = self.weave.insert(atom)?;
        if let Some(added) = result.added() {
            self.version.vector.observe(added.id);
        }
        Ok(result)
    }

    fn observe_added(&mut self, batch: &AtomBatch<O>) {
        for atom in &batch.added {
            self.version.vector.observe(atom.id);
        }
    }

    /// The full linearization and version vector; `init` rebuilds an identical weave from it.
    pub fn export_state(&self) -> Snapshot<O> {
        Snapshot {
            atoms: self.weave.atoms().to_vec(),
            version: self.version.vector.clone(),
        }
    }

    /// Batches of everything `peer` has not seen, split at `max_batch_size`.
    pub fn export_delta(&self, peer: &VersionVector) -> Vec<AtomBatch<O>> {
        let delta = self.weave.delta_for(peer);
        match self.config.max_batch_size {
            Some(size) => delta
                .chunks(size)
                .map(|chunk| AtomBatch::from_atoms(chunk.to_vec()))
                .collect(),
            None if delta.is_empty() => Vec::new(),
            None => vec![AtomBatch::from_atoms(delta)],
        }
    }

    /// Write the current state to `store`.
    pub fn save_to<S>(&self, store: &mut S) -> Result<()>
    where
        S: SnapshotStore<O>,
    {
        store.save(&self.export_state())
    }
}

impl<O, V> StateStore<O, V> {
    pub fn weave(&self) -> &Weave<O, V> {
        &self.weave
    }

    pub fn version(&self) -> &CurrentVersion {
        &self.version
    }

    pub fn vector(&self) -> &VersionVector {
        &self.version.vector
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn site(&self) -> Option<SiteId> {
        self.version.current_site
    }

    /// Attribute subsequent [`StateStore::mint_remote`] calls to `site`.
    pub fn set_remote_site(&mut self, site: Option<SiteId>) {
        self.version.remote_site = site;
    }
}

fn log_summary(summary: &BatchSummary) {
    if summary.rejected() == 0 && summary.failed == 0 {
        debug!(added = summary.added, "remote batch applied");
        return;
    }
    info!(
        added = summary.added,
        duplicate = summary.duplicate,
        cause_not_found = summary.cause_not_found,
        invalid_operation = summary.invalid_operation,
        checksum_mismatch = summary.checksum_mismatch,
        failed = summary.failed,
        "remote batch applied with rejections"
    );
}
