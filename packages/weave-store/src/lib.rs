//! Durable homes for weave snapshots.
//!
//! Both stores persist the full linearization, so loading never has to re-sort anything; the
//! replica replays the atoms in stored order and checks that they still form a valid weave.

mod json;
pub use json::JsonFileStore;

#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
