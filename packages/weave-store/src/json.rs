use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use weave_core::{Error, Snapshot, SnapshotStore, SIBLING_ORDER_VERSION};

const ORDER_FIELD: &str = "sibling_order_version";

/// A snapshot kept as one JSON document on disk.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-write leaves the previous
/// snapshot intact. Documents carry `sibling_order_version`; one written under another version
/// is refused. A bare snapshot without the field (as produced by [`Snapshot::to_json`]) is
/// accepted and replayed under the current order.
#[derive(Debug)]
pub struct JsonFileStore<O> {
    path: PathBuf,
    pretty: bool,
    _payload: PhantomData<fn() -> O>,
}

impl<O> JsonFileStore<O> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
            _payload: PhantomData,
        }
    }

    /// Write indented JSON, for snapshots meant to be read by people.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<O> SnapshotStore<O> for JsonFileStore<O>
where
    O: Serialize + DeserializeOwned,
{
    fn load(&self) -> weave_core::Result<Option<Snapshot<O>>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        };
        let corrupt = |e: serde_json::Error| Error::CorruptSnapshot(e.to_string());
        let mut doc: Value = serde_json::from_str(&json).map_err(corrupt)?;
        if let Some(order) = doc.as_object_mut().and_then(|fields| fields.remove(ORDER_FIELD)) {
            if order.as_u64() != Some(u64::from(SIBLING_ORDER_VERSION)) {
                return Err(Error::CorruptSnapshot(format!(
                    "stored under sibling order {order}, expected {SIBLING_ORDER_VERSION}"
                )));
            }
        }
        let snapshot: Snapshot<O> = serde_json::from_value(doc).map_err(corrupt)?;
        debug!(path = %self.path.display(), atoms = snapshot.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save(&mut self, snapshot: &Snapshot<O>) -> weave_core::Result<()> {
        let mut doc = serde_json::to_value(snapshot)?;
        if let Some(fields) = doc.as_object_mut() {
            fields.insert(ORDER_FIELD.into(), Value::from(SIBLING_ORDER_VERSION));
        }
        let json = if self.pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| Error::Storage(format!("{}: {e}", temp.display())))?;
        fs::rename(&temp, &self.path)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), atoms = snapshot.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{Atom, AtomId, SiteId};

    #[test]
    fn missing_file_is_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<u8> = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.json");
        fs::write(&path, "{not json").unwrap();
        let store: JsonFileStore<u8> = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(Error::CorruptSnapshot(_))));
    }

    #[test]
    fn other_sibling_order_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.json");
        fs::write(&path, r#"{"sibling_order_version":2,"atoms":[],"version":{}}"#).unwrap();
        let store: JsonFileStore<u8> = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(Error::CorruptSnapshot(_))));
    }

    #[test]
    fn saved_documents_record_the_sibling_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.json");
        let mut store: JsonFileStore<u8> = JsonFileStore::new(&path);
        store.save(&Snapshot::empty()).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["sibling_order_version"], SIBLING_ORDER_VERSION);
        assert_eq!(doc["atoms"], serde_json::json!([]));
    }

    #[test]
    fn bare_snapshot_documents_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.json");
        let snapshot = Snapshot {
            atoms: vec![Atom::root(AtomId::new(SiteId(1), 0), 3u8)],
            version: [(SiteId(1), 0)].into_iter().collect(),
        };
        fs::write(&path, snapshot.to_json().unwrap()).unwrap();
        let store: JsonFileStore<u8> = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/weave.json");
        let mut store = JsonFileStore::new(&path).pretty(true);
        let snapshot = Snapshot {
            atoms: vec![Atom::root(AtomId::new(SiteId(1), 0), 7u8)],
            version: [(SiteId(1), 0)].into_iter().collect(),
        };
        store.save(&snapshot).unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());
        assert!(fs::read_to_string(&path).unwrap().contains('\n'));
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }
}
