#![forbid(unsafe_code)]
//! Core of a causal-tree (weave) CRDT.
//!
//! Sites append immutable atoms, each attached to a causal parent. Every replica keeps the
//! atoms in one deterministic linearization, so replicas holding the same set of atoms agree on
//! their order without coordination. Transport, persistence, and the meaning of payloads live
//! outside this crate behind the traits defined here.

pub mod adapter;
pub mod atom;
pub mod batch;
pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod ids;
pub mod ops;
pub mod traits;
pub mod version_vector;
pub mod weave;

pub use adapter::{Snapshot, StateStore};
pub use atom::{Atom, HashedAtom};
pub use batch::{
    merge_into_batch, AddResult, AtomBatch, BatchSummary, FailedAtom, RejectedAtom,
    RejectionReason, RemoteEvent,
};
pub use config::WeaveConfig;
pub use error::{Error, Result};
pub use filter::{after, any, from_site, not_seen_by, AtomFilter, Everything, FilterExt};
pub use hash::{canonical_json, content_hash, hash_value};
pub use ids::{sibling_order, AtomId, SiteId, Timestamp, MAX_TIMESTAMP, SIBLING_ORDER_VERSION};
pub use ops::{Op, OpValidator};
pub use traits::{AcceptAll, MemoryStore, SnapshotStore, Validator};
pub use version_vector::{CurrentVersion, VersionVector};
pub use weave::Weave;
