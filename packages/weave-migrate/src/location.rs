use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde_json::Value;
use weave_core::{Snapshot, SnapshotStore};
use weave_store::{JsonFileStore, SqliteStore};

/// Where a snapshot lives, as written on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    Json(PathBuf),
    Sqlite(PathBuf),
}

impl FromStr for StoreLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, path) = s
            .split_once(':')
            .ok_or_else(|| format!("expected json:<path> or sqlite:<path>, got {s:?}"))?;
        if path.is_empty() {
            return Err(format!("missing path in {s:?}"));
        }
        match kind {
            "json" => Ok(StoreLocation::Json(path.into())),
            "sqlite" => Ok(StoreLocation::Sqlite(path.into())),
            other => Err(format!("unknown store kind {other:?}")),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::Json(path) => write!(f, "json:{}", path.display()),
            StoreLocation::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

impl StoreLocation {
    pub fn open(&self) -> weave_core::Result<AnyStore> {
        Ok(match self {
            StoreLocation::Json(path) => AnyStore::Json(JsonFileStore::new(path).pretty(true)),
            StoreLocation::Sqlite(path) => AnyStore::Sqlite(SqliteStore::new(path)?),
        })
    }
}

/// Either backend, holding payloads the tool does not interpret.
pub enum AnyStore {
    Json(JsonFileStore<Value>),
    Sqlite(SqliteStore<Value>),
}

impl SnapshotStore<Value> for AnyStore {
    fn load(&self) -> weave_core::Result<Option<Snapshot<Value>>> {
        match self {
            AnyStore::Json(store) => store.load(),
            AnyStore::Sqlite(store) => store.load(),
        }
    }

    fn save(&mut self, snapshot: &Snapshot<Value>) -> weave_core::Result<()> {
        match self {
            AnyStore::Json(store) => store.save(snapshot),
            AnyStore::Sqlite(store) => store.save(snapshot),
        }
    }
}
