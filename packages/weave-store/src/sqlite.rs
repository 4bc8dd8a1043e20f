use std::marker::PhantomData;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use weave_core::{
    Atom, AtomId, Error, SiteId, Snapshot, SnapshotStore, Timestamp, VersionVector,
    SIBLING_ORDER_VERSION,
};

/// SQLite-backed snapshot store: one row per atom in linearized order, one per version vector
/// entry, and a metadata table recording which sibling ordering the rows were written under.
pub struct SqliteStore<O> {
    conn: Connection,
    _payload: PhantomData<fn() -> O>,
}

type AtomRow = (i64, i64, Option<i64>, Option<i64>, String);

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

impl<O> SqliteStore<O> {
    pub fn new_in_memory() -> weave_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn)
    }

    pub fn new(path: impl AsRef<Path>) -> weave_core::Result<Self> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> weave_core::Result<Self> {
        let store = Self {
            conn,
            _payload: PhantomData,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> weave_core::Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS atoms (
                    seq INTEGER PRIMARY KEY,
                    site INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL,
                    cause_site INTEGER,
                    cause_timestamp INTEGER,
                    payload TEXT NOT NULL,
                    UNIQUE (site, timestamp)
                );
                CREATE TABLE IF NOT EXISTS version (
                    site INTEGER PRIMARY KEY,
                    timestamp INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS meta (
                    key TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                );",
            )
            .map_err(storage)
    }

    fn load_atoms(&self) -> weave_core::Result<Vec<AtomRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT site, timestamp, cause_site, cause_timestamp, payload
                 FROM atoms
                 ORDER BY seq ASC",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(storage)?;

        let mut atoms = Vec::new();
        for row in rows {
            atoms.push(row.map_err(storage)?);
        }
        Ok(atoms)
    }

    fn load_version(&self) -> weave_core::Result<VersionVector> {
        let mut stmt = self
            .conn
            .prepare("SELECT site, timestamp FROM version")
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
            .map_err(storage)?;

        let mut vector = VersionVector::new();
        for row in rows {
            let (site, timestamp) = row.map_err(storage)?;
            vector.observe(AtomId::new(to_site(site)?, to_timestamp(timestamp)?));
        }
        Ok(vector)
    }
}

fn to_site(value: i64) -> weave_core::Result<SiteId> {
    u32::try_from(value)
        .map(SiteId)
        .map_err(|_| Error::CorruptSnapshot(format!("site {value} out of range")))
}

fn to_timestamp(value: i64) -> weave_core::Result<Timestamp> {
    Timestamp::try_from(value)
        .map_err(|_| Error::CorruptSnapshot(format!("timestamp {value} out of range")))
}

fn from_timestamp(value: Timestamp) -> weave_core::Result<i64> {
    i64::try_from(value).map_err(|_| Error::Storage("timestamp overflow".into()))
}

fn row_to_atom<O: DeserializeOwned>(row: AtomRow) -> weave_core::Result<Atom<O>> {
    let (site, timestamp, cause_site, cause_timestamp, payload) = row;
    let id = AtomId::new(to_site(site)?, to_timestamp(timestamp)?);
    let cause = match (cause_site, cause_timestamp) {
        (Some(site), Some(timestamp)) => Some(AtomId::new(to_site(site)?, to_timestamp(timestamp)?)),
        (None, None) => None,
        _ => return Err(Error::CorruptSnapshot(format!("atom {id} has a partial cause"))),
    };
    let payload = serde_json::from_str(&payload)
        .map_err(|e| Error::CorruptSnapshot(format!("payload of {id}: {e}")))?;
    Ok(Atom::new(id, cause, payload))
}

impl<O> SnapshotStore<O> for SqliteStore<O>
where
    O: Serialize + DeserializeOwned,
{
    fn load(&self) -> weave_core::Result<Option<Snapshot<O>>> {
        let order: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'sibling_order_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage)?;
        match order {
            None => return Ok(None),
            Some(v) if v == i64::from(SIBLING_ORDER_VERSION) => {}
            Some(v) => {
                return Err(Error::CorruptSnapshot(format!(
                    "stored under sibling order v{v}, expected v{SIBLING_ORDER_VERSION}"
                )))
            }
        }

        let atoms = self
            .load_atoms()?
            .into_iter()
            .map(row_to_atom)
            .collect::<weave_core::Result<Vec<_>>>()?;
        let version = self.load_version()?;
        debug!(atoms = atoms.len(), "snapshot loaded from sqlite");
        Ok(Some(Snapshot { atoms, version }))
    }

    fn save(&mut self, snapshot: &Snapshot<O>) -> weave_core::Result<()> {
        let tx = self.conn.transaction().map_err(storage)?;
        tx.execute_batch("DELETE FROM atoms; DELETE FROM version;")
            .map_err(storage)?;
        {
            let mut insert_atom = tx
                .prepare(
                    "INSERT INTO atoms (seq, site, timestamp, cause_site, cause_timestamp, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(storage)?;
            for (seq, atom) in snapshot.atoms.iter().enumerate() {
                let seq = i64::try_from(seq).map_err(|_| Error::Storage("seq overflow".into()))?;
                let cause_timestamp = atom.cause.map(|c| from_timestamp(c.timestamp)).transpose()?;
                insert_atom
                    .execute(params![
                        seq,
                        atom.id.site.0,
                        from_timestamp(atom.id.timestamp)?,
                        atom.cause.map(|c| c.site.0),
                        cause_timestamp,
                        serde_json::to_string(&atom.payload)?,
                    ])
                    .map_err(storage)?;
            }

            let mut insert_version = tx
                .prepare("INSERT INTO version (site, timestamp) VALUES (?1, ?2)")
                .map_err(storage)?;
            for (site, timestamp) in snapshot.version.entries() {
                insert_version
                    .execute(params![site.0, from_timestamp(timestamp)?])
                    .map_err(storage)?;
            }
        }
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('sibling_order_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [i64::from(SIBLING_ORDER_VERSION)],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;
        debug!(atoms = snapshot.len(), "snapshot saved to sqlite");
        Ok(())
    }
}
