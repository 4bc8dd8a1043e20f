use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::content_hash;
use crate::ids::AtomId;

/// One immutable operation, its identity, and the atom it is attached to.
///
/// Two atoms are the same atom iff their ids are equal; the weave never compares payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom<O> {
    pub id: AtomId,
    /// `None` marks a root atom.
    pub cause: Option<AtomId>,
    pub payload: O,
}

impl<O> Atom<O> {
    pub fn new(id: AtomId, cause: Option<AtomId>, payload: O) -> Self {
        Self { id, cause, payload }
    }

    pub fn root(id: AtomId, payload: O) -> Self {
        Self::new(id, None, payload)
    }

    pub fn child(id: AtomId, cause: AtomId, payload: O) -> Self {
        Self::new(id, Some(cause), payload)
    }

    pub fn is_root(&self) -> bool {
        self.cause.is_none()
    }

    /// Structural checks that make an atom unusable regardless of weave state.
    pub fn validate(&self) -> Result<()> {
        self.id.validate()?;
        if let Some(cause) = &self.cause {
            cause.validate()?;
            if *cause == self.id {
                return Err(Error::MalformedAtom(format!("atom {} is its own cause", self.id)));
            }
        }
        Ok(())
    }
}

impl<O: Serialize> Atom<O> {
    /// Canonical digest of the whole atom (id, cause, and payload).
    pub fn content_hash(&self) -> Result<String> {
        content_hash(self)
    }
}

/// An atom together with the digest its sender declared for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedAtom<O> {
    pub atom: Atom<O>,
    pub hash: String,
}

impl<O: Serialize> HashedAtom<O> {
    /// Attach the atom's own digest.
    pub fn seal(atom: Atom<O>) -> Result<Self> {
        let hash = atom.content_hash()?;
        Ok(Self { atom, hash })
    }

    /// Whether the declared digest matches the content.
    pub fn verify(&self) -> Result<bool> {
        Ok(self.atom.content_hash()? == self.hash)
    }
}
