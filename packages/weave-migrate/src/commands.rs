use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use weave_core::{
    hash_value, AcceptAll, AtomId, BatchSummary, SiteId, SnapshotStore, StateStore, Weave,
    WeaveConfig,
};

use crate::location::StoreLocation;

/// Read settings from `path` (if given) and let the command line override the site.
pub fn load_config(path: Option<&Path>, site: Option<SiteId>) -> Result<WeaveConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<WeaveConfig>(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => WeaveConfig::default(),
    };
    if site.is_some() {
        config.site = site;
    }
    config.validate()?;
    Ok(config)
}

/// Outcome of one migration.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub passes: usize,
    pub atoms: usize,
    pub summary: BatchSummary,
    /// Atoms whose cause never showed up in the source snapshot.
    pub unresolved: Vec<AtomId>,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Atoms read:      {}", self.atoms)?;
        writeln!(f, "Passes:          {}", self.passes)?;
        writeln!(f, "Added:           {}", self.summary.added)?;
        writeln!(f, "Duplicates:      {}", self.summary.duplicate)?;
        writeln!(f, "Invalid:         {}", self.summary.invalid_operation)?;
        writeln!(f, "Failed:          {}", self.summary.failed)?;
        write!(f, "Missing cause:   {}", self.unresolved.len())
    }
}

/// `weave-migrate migrate`: replay `from` into a fresh replica and save the result to `to`.
///
/// Atoms are fed in stored order. Those rejected for a missing cause are retried in further
/// passes until a pass adds nothing; whatever is left is reported, not saved.
pub fn migrate(from: &StoreLocation, to: &StoreLocation, config: WeaveConfig) -> Result<MigrationReport> {
    let Some(site) = config.site else {
        bail!("no site given: pass --site or set `site` in the config file");
    };

    let source = from.open().with_context(|| format!("opening {from}"))?;
    let Some(snapshot) = source.load().with_context(|| format!("loading {from}"))? else {
        bail!("{from} holds no snapshot");
    };
    info!(%from, atoms = snapshot.len(), "snapshot loaded");

    let mut replica: StateStore<Value> = StateStore::init(site, None, AcceptAll, config)?;
    let mut report = MigrationReport {
        atoms: snapshot.len(),
        ..MigrationReport::default()
    };

    let mut pending = snapshot.atoms;
    while !pending.is_empty() {
        report.passes += 1;
        let before = pending.len();
        let mut batch = replica.apply_remote(pending);
        pending = batch.take_pending();
        let mut summary = batch.summary();
        // retried atoms are counted once, in the pass that settles them
        summary.cause_not_found = 0;
        report.summary.merge(&summary);
        if pending.len() == before {
            break;
        }
    }
    report.unresolved = pending.iter().map(|atom| atom.id).collect();
    report.summary.cause_not_found = report.unresolved.len();
    if !report.unresolved.is_empty() {
        warn!(count = report.unresolved.len(), "atoms dropped for a missing cause");
    }

    let mut target = to.open().with_context(|| format!("opening {to}"))?;
    replica
        .save_to(&mut target)
        .with_context(|| format!("saving to {to}"))?;
    info!(%to, atoms = replica.weave().len(), passes = report.passes, "snapshot migrated");
    Ok(report)
}

/// What `inspect` prints about a snapshot.
#[derive(Debug)]
pub struct SnapshotInfo {
    pub atoms: usize,
    pub roots: Vec<AtomId>,
    pub version: Vec<(SiteId, u64)>,
    /// Set when the stored atoms do not replay into the same linearization.
    pub problem: Option<String>,
}

impl fmt::Display for SnapshotInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Atoms: {}", self.atoms)?;
        let roots: Vec<String> = self.roots.iter().map(|id| id.to_string()).collect();
        writeln!(f, "Roots: {}", roots.join(", "))?;
        writeln!(f, "Version vector:")?;
        for (site, timestamp) in &self.version {
            writeln!(f, "  site {site:<10} {timestamp}")?;
        }
        match &self.problem {
            None => writeln!(f, "Linearization: ok"),
            Some(problem) => writeln!(f, "Linearization: {problem}"),
        }
    }
}

/// `weave-migrate inspect <store>`.
pub fn inspect(location: &StoreLocation) -> Result<SnapshotInfo> {
    let store = location.open().with_context(|| format!("opening {location}"))?;
    let Some(snapshot) = store.load().with_context(|| format!("loading {location}"))? else {
        bail!("{location} holds no snapshot");
    };

    let mut weave: Weave<Value> = Weave::new();
    let batch = weave.insert_batch(snapshot.atoms.iter().cloned());
    let problem = if batch.summary().rejected() + batch.failed.len() > 0 {
        Some(format!("{} atoms do not replay", batch.summary().rejected() + batch.failed.len()))
    } else if weave.atoms() != snapshot.atoms.as_slice() {
        Some("stored order differs from the canonical order".to_string())
    } else {
        None
    };

    Ok(SnapshotInfo {
        atoms: snapshot.len(),
        roots: weave.roots().map(|atom| atom.id).collect(),
        version: snapshot.version.entries().collect(),
        problem,
    })
}

/// `weave-migrate hash <file.json>`.
pub fn hash(path: &Path) -> Result<String> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(hash_value(Some(&value))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{Atom, Snapshot};

    fn id(site: u32, ts: u64) -> AtomId {
        AtomId::new(SiteId(site), ts)
    }

    fn write_source(dir: &Path, atoms: Vec<Atom<Value>>) -> StoreLocation {
        let location = StoreLocation::Json(dir.join("source.json"));
        let version = atoms.iter().map(|a| (a.id.site, a.id.timestamp)).collect();
        let mut store = location.open().unwrap();
        store.save(&Snapshot { atoms, version }).unwrap();
        location
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        fs::write(&path, "site = 4\nmax_batch_size = 100\n").unwrap();

        let from_file = load_config(Some(&path), None).unwrap();
        assert_eq!(from_file.site, Some(SiteId(4)));
        assert_eq!(from_file.max_batch_size, Some(100));
        assert!(from_file.verify_checksums);

        let overridden = load_config(Some(&path), Some(SiteId(9))).unwrap();
        assert_eq!(overridden.site, Some(SiteId(9)));
    }

    #[test]
    fn bad_config_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        fs::write(&path, "max_batch_size = 0\n").unwrap();
        assert!(load_config(Some(&path), None).is_err());

        fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(load_config(Some(&path), None).is_err());
    }

    #[test]
    fn migrate_reorders_and_retries_out_of_order_atoms() {
        let dir = tempfile::tempdir().unwrap();
        let from = write_source(
            dir.path(),
            vec![
                Atom::child(id(1, 2), id(1, 1), Value::from("grandchild")),
                Atom::child(id(1, 1), id(1, 0), Value::from("child")),
                Atom::root(id(1, 0), Value::from("root")),
                Atom::child(id(2, 5), id(7, 7), Value::from("orphan")),
            ],
        );
        let to = StoreLocation::Sqlite(dir.path().join("target.db"));

        let config = load_config(None, Some(SiteId(1))).unwrap();
        let report = migrate(&from, &to, config).unwrap();
        assert_eq!(report.atoms, 4);
        assert_eq!(report.summary.added, 3);
        assert_eq!(report.unresolved, vec![id(2, 5)]);
        assert_eq!(report.passes, 4);

        let saved = to.open().unwrap().load().unwrap().unwrap();
        assert_eq!(
            saved.atoms.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![id(1, 0), id(1, 1), id(1, 2)]
        );

        let info = inspect(&to).unwrap();
        assert_eq!(info.atoms, 3);
        assert_eq!(info.roots, vec![id(1, 0)]);
        assert_eq!(info.problem, None);
    }

    #[test]
    fn migrate_requires_a_site() {
        let dir = tempfile::tempdir().unwrap();
        let from = write_source(dir.path(), vec![Atom::root(id(1, 0), Value::Null)]);
        let to = StoreLocation::Json(dir.path().join("out.json"));
        assert!(migrate(&from, &to, WeaveConfig::default()).is_err());
    }

    #[test]
    fn inspect_flags_non_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let from = write_source(
            dir.path(),
            vec![
                Atom::root(id(1, 0), Value::Null),
                Atom::child(id(1, 1), id(1, 0), Value::Null),
                Atom::child(id(1, 2), id(1, 0), Value::Null),
            ],
        );
        let info = inspect(&from).unwrap();
        assert_eq!(info.problem.as_deref(), Some("stored order differs from the canonical order"));
    }

    #[test]
    fn hash_ignores_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&a, r#"{"a": 1, "b": 2}"#).unwrap();
        fs::write(&b, r#"{ "b": 2, "a": 1 }"#).unwrap();
        assert_eq!(hash(&a).unwrap(), hash(&b).unwrap());

        fs::write(&a, "null").unwrap();
        assert!(hash(&a).is_err());
    }
}
