use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tracing::{debug, warn};

use crate::atom::Atom;
use crate::error::Result;
use crate::ids::AtomId;

/// Why an atom was not inserted. These are expected outcomes, not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    DuplicateAtom,
    CauseNotFound,
    InvalidOperation,
    ChecksumMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedAtom<O> {
    pub atom: Atom<O>,
    pub reason: RejectionReason,
}

/// Outcome of a single insertion attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddResult<O> {
    Added(Atom<O>),
    Rejected(RejectedAtom<O>),
}

impl<O> AddResult<O> {
    pub fn rejected(atom: Atom<O>, reason: RejectionReason) -> Self {
        AddResult::Rejected(RejectedAtom { atom, reason })
    }

    pub fn added(&self) -> Option<&Atom<O>> {
        match self {
            AddResult::Added(atom) => Some(atom),
            AddResult::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectedAtom<O>> {
        match self {
            AddResult::Added(_) => None,
            AddResult::Rejected(rejected) => Some(rejected),
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, AddResult::Added(_))
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        self.rejection().map(|r| r.reason)
    }

    pub fn atom(&self) -> &Atom<O> {
        match self {
            AddResult::Added(atom) => atom,
            AddResult::Rejected(rejected) => &rejected.atom,
        }
    }
}

/// An atom whose insertion aborted with a hard error while processing a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedAtom {
    pub id: AtomId,
    pub error: String,
}

/// Ordered added/rejected outcomes; the unit of network transfer and bulk import.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomBatch<O> {
    pub added: Vec<Atom<O>>,
    pub rejected: Vec<RejectedAtom<O>>,
    /// Per-atom hard failures isolated during a batch. Local diagnostics only.
    #[serde(skip)]
    pub failed: Vec<FailedAtom>,
}

impl<O> Default for AtomBatch<O> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            rejected: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Fold results into a batch, keeping the relative order of added and rejected atoms.
pub fn merge_into_batch<O>(results: impl IntoIterator<Item = AddResult<O>>) -> AtomBatch<O> {
    results.into_iter().collect()
}

impl<O> AtomBatch<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch carrying only added atoms, as produced for transmission.
    pub fn from_atoms(atoms: Vec<Atom<O>>) -> Self {
        Self {
            added: atoms,
            ..Self::default()
        }
    }

    pub fn push(&mut self, result: AddResult<O>) {
        match result {
            AddResult::Added(atom) => self.added.push(atom),
            AddResult::Rejected(rejected) => self.rejected.push(rejected),
        }
    }

    /// Record the outcome of one insertion attempt; hard errors land in `failed`.
    pub fn record(&mut self, id: AtomId, outcome: Result<AddResult<O>>) {
        match outcome {
            Ok(result) => {
                if let Some(reason) = result.reason() {
                    debug!(atom = %id, ?reason, "atom rejected");
                }
                self.push(result);
            }
            Err(e) => {
                warn!(atom = %id, error = %e, "atom failed");
                self.failed.push(FailedAtom {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Append another batch, preserving order within each list.
    pub fn append(&mut self, mut other: AtomBatch<O>) {
        self.added.append(&mut other.added);
        self.rejected.append(&mut other.rejected);
        self.failed.append(&mut other.failed);
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.rejected.is_empty() && self.failed.is_empty()
    }

    pub fn rejected_by(&self, reason: RejectionReason) -> impl Iterator<Item = &RejectedAtom<O>> {
        self.rejected.iter().filter(move |r| r.reason == reason)
    }

    /// Remove and return atoms rejected for a missing cause, in rejection order.
    ///
    /// These are the atoms a caller buffers and resubmits once more history arrives.
    pub fn take_pending(&mut self) -> Vec<Atom<O>> {
        let (pending, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.rejected)
            .into_iter()
            .partition(|r| r.reason == RejectionReason::CauseNotFound);
        self.rejected = rest;
        pending.into_iter().map(|r| r.atom).collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            added: self.added.len(),
            failed: self.failed.len(),
            ..BatchSummary::default()
        };
        for rejected in &self.rejected {
            match rejected.reason {
                RejectionReason::DuplicateAtom => summary.duplicate += 1,
                RejectionReason::CauseNotFound => summary.cause_not_found += 1,
                RejectionReason::InvalidOperation => summary.invalid_operation += 1,
                RejectionReason::ChecksumMismatch => summary.checksum_mismatch += 1,
            }
        }
        summary
    }
}

impl<O> FromIterator<AddResult<O>> for AtomBatch<O> {
    fn from_iter<I: IntoIterator<Item = AddResult<O>>>(iter: I) -> Self {
        let mut batch = AtomBatch::new();
        batch.extend(iter);
        batch
    }
}

impl<O> Extend<AddResult<O>> for AtomBatch<O> {
    fn extend<I: IntoIterator<Item = AddResult<O>>>(&mut self, iter: I) {
        for result in iter {
            self.push(result);
        }
    }
}

/// Aggregate counts of a batch, used for logging instead of per-atom reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub added: usize,
    pub duplicate: usize,
    pub cause_not_found: usize,
    pub invalid_operation: usize,
    pub checksum_mismatch: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn rejected(&self) -> usize {
        self.duplicate + self.cause_not_found + self.invalid_operation + self.checksum_mismatch
    }

    pub fn merge(&mut self, other: &BatchSummary) {
        self.added += other.added;
        self.duplicate += other.duplicate;
        self.cause_not_found += other.cause_not_found;
        self.invalid_operation += other.invalid_operation;
        self.checksum_mismatch += other.checksum_mismatch;
        self.failed += other.failed;
    }
}

/// Transport envelope. The core only cares about batches carried in `data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub name: String,
    pub data: serde_json::Value,
}

impl RemoteEvent {
    pub fn batch<O: Serialize>(name: impl Into<String>, batch: &AtomBatch<O>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            data: serde_json::to_value(batch)?,
        })
    }

    pub fn decode_batch<O: DeserializeOwned>(&self) -> Result<AtomBatch<O>> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SiteId;

    fn atom(ts: u64) -> Atom<u8> {
        Atom::root(AtomId::new(SiteId(1), ts), ts as u8)
    }

    #[test]
    fn merge_keeps_relative_order() {
        let results = vec![
            AddResult::Added(atom(1)),
            AddResult::rejected(atom(9), RejectionReason::CauseNotFound),
            AddResult::Added(atom(2)),
            AddResult::rejected(atom(1), RejectionReason::DuplicateAtom),
        ];
        let batch = merge_into_batch(results);
        assert_eq!(batch.added, vec![atom(1), atom(2)]);
        assert_eq!(
            batch.rejected.iter().map(|r| (r.atom.id.timestamp, r.reason)).collect::<Vec<_>>(),
            vec![(9, RejectionReason::CauseNotFound), (1, RejectionReason::DuplicateAtom)]
        );
    }

    #[test]
    fn take_pending_only_drains_missing_causes() {
        let mut batch: AtomBatch<u8> = vec![
            AddResult::rejected(atom(3), RejectionReason::CauseNotFound),
            AddResult::rejected(atom(4), RejectionReason::InvalidOperation),
            AddResult::rejected(atom(5), RejectionReason::CauseNotFound),
        ]
        .into_iter()
        .collect();

        let pending = batch.take_pending();
        assert_eq!(pending, vec![atom(3), atom(5)]);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].reason, RejectionReason::InvalidOperation);
    }

    #[test]
    fn summary_counts_reasons() {
        let mut batch: AtomBatch<u8> = vec![
            AddResult::Added(atom(1)),
            AddResult::rejected(atom(1), RejectionReason::DuplicateAtom),
            AddResult::rejected(atom(2), RejectionReason::ChecksumMismatch),
        ]
        .into_iter()
        .collect();
        batch.failed.push(FailedAtom {
            id: AtomId::new(SiteId(1), 7),
            error: "boom".into(),
        });

        let summary = batch.summary();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.duplicate, 1);
        assert_eq!(summary.checksum_mismatch, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rejected(), 2);
    }

    #[test]
    fn remote_event_carries_batch_without_failures() {
        let mut batch = AtomBatch::from_atoms(vec![atom(1), atom(2)]);
        batch.failed.push(FailedAtom {
            id: AtomId::new(SiteId(1), 7),
            error: "local only".into(),
        });

        let event = RemoteEvent::batch("add_atoms", &batch).unwrap();
        assert_eq!(event.name, "add_atoms");
        let decoded: AtomBatch<u8> = event.decode_batch().unwrap();
        assert_eq!(decoded.added, batch.added);
        assert!(decoded.failed.is_empty());
    }
}
