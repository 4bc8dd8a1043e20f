//! A ready-made payload: a document of objects, their tags, and tag values.
//!
//! ```text
//! Object ─┬─ Tag ─┬─ Value
//!         │       └─ Delete
//!         └─ Delete
//! ```

use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::traits::Validator;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// Root of one object's history.
    Object { id: String },
    Tag { name: String },
    /// Value assigned to the causing tag. Among sibling values the first in weave order wins.
    Value { value: serde_json::Value },
    /// Tombstone for the causing object, tag, or value.
    Delete,
}

impl Op {
    pub fn object(id: impl Into<String>) -> Self {
        Op::Object { id: id.into() }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Op::Tag { name: name.into() }
    }

    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        Op::Value {
            value: value.into(),
        }
    }
}

/// Enforces the parent/child shape drawn in the module docs.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpValidator;

impl Validator<Op> for OpValidator {
    fn validate(&self, atom: &Atom<Op>, cause: Option<&Atom<Op>>) -> bool {
        let cause = cause.map(|c| &c.payload);
        match (&atom.payload, cause) {
            (Op::Object { .. }, None) => true,
            (Op::Tag { .. }, Some(Op::Object { .. })) => true,
            (Op::Value { .. }, Some(Op::Tag { .. })) => true,
            (Op::Delete, Some(Op::Object { .. } | Op::Tag { .. } | Op::Value { .. })) => true,
            _ => false,
        }
    }
}
