use crate::adapter::Snapshot;
use crate::atom::Atom;
use crate::error::Result;

/// Semantic validation hook owned by the operation type.
///
/// Called once the atom's cause is known to be present; returning `false` rejects the atom
/// with `InvalidOperation`.
pub trait Validator<O> {
    fn validate(&self, atom: &Atom<O>, cause: Option<&Atom<O>>) -> bool;
}

/// Accepts every structurally valid atom.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl<O> Validator<O> for AcceptAll {
    fn validate(&self, _atom: &Atom<O>, _cause: Option<&Atom<O>>) -> bool {
        true
    }
}

impl<O, F> Validator<O> for F
where
    F: Fn(&Atom<O>, Option<&Atom<O>>) -> bool,
{
    fn validate(&self, atom: &Atom<O>, cause: Option<&Atom<O>>) -> bool {
        self(atom, cause)
    }
}

/// Long-term home of a serialized weave.
pub trait SnapshotStore<O> {
    /// Load the persisted snapshot, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot<O>>>;
    /// Replace the persisted snapshot.
    fn save(&mut self, snapshot: &Snapshot<O>) -> Result<()>;
}

/// In-memory snapshot store for tests and short-lived replicas.
#[derive(Clone, Debug)]
pub struct MemoryStore<O> {
    snapshot: Option<Snapshot<O>>,
}

impl<O> Default for MemoryStore<O> {
    fn default() -> Self {
        Self { snapshot: None }
    }
}

impl<O: Clone> SnapshotStore<O> for MemoryStore<O> {
    fn load(&self) -> Result<Option<Snapshot<O>>> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot<O>) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }
}
