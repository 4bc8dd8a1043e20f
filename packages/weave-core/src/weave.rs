use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::atom::Atom;
use crate::batch::{AddResult, AtomBatch, RejectionReason};
use crate::error::{Error, Result};
use crate::filter::{not_seen_by, AtomFilter};
use crate::ids::{sibling_order, AtomId};
use crate::traits::{AcceptAll, Validator};
use crate::version_vector::VersionVector;

/// The causal tree, stored as its linearization.
///
/// `atoms` is a depth-first pre-order walk of the tree where siblings appear in
/// [`sibling_order`] and roots are siblings of one another. Every atom's subtree is therefore
/// a contiguous run starting at the atom itself, and the sequence depends only on the set of
/// atoms present, never on the order they arrived in.
#[derive(Clone, Debug)]
pub struct Weave<O, V = AcceptAll> {
    atoms: Vec<Atom<O>>,
    index: HashMap<AtomId, usize>,
    validator: V,
}

impl<O> Weave<O, AcceptAll> {
    pub fn new() -> Self {
        Self::with_validator(AcceptAll)
    }
}

impl<O> Default for Weave<O, AcceptAll> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, V> Weave<O, V> {
    pub fn with_validator(validator: V) -> Self {
        Self {
            atoms: Vec::new(),
            index: HashMap::new(),
            validator,
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, id: &AtomId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &AtomId) -> Option<&Atom<O>> {
        self.index.get(id).map(|&pos| &self.atoms[pos])
    }

    /// Position of `id` in the linearization.
    pub fn position(&self, id: &AtomId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Atoms in linearized order.
    pub fn iter(&self) -> std::slice::Iter<'_, Atom<O>> {
        self.atoms.iter()
    }

    pub fn atoms(&self) -> &[Atom<O>] {
        &self.atoms
    }

    pub fn ids(&self) -> Vec<AtomId> {
        self.atoms.iter().map(|a| a.id).collect()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Atom<O>> {
        self.atoms.iter().filter(|a| a.is_root())
    }

    /// Atoms accepted by `filter`, in linearized order.
    pub fn filter<'a, F>(&'a self, filter: &'a F) -> impl Iterator<Item = &'a Atom<O>> + 'a
    where
        F: AtomFilter<O>,
    {
        self.atoms.iter().filter(move |a| filter.accepts(a))
    }

    /// `id` followed by all of its descendants.
    pub fn subtree(&self, id: &AtomId) -> Option<&[Atom<O>]> {
        let start = self.position(id)?;
        let end = self.subtree_end(start);
        Some(&self.atoms[start..end])
    }

    /// Direct children of `id`, in sibling order.
    pub fn children(&self, id: &AtomId) -> Vec<&Atom<O>> {
        self.subtree(id)
            .map(|run| run.iter().filter(|a| a.cause == Some(*id)).collect())
            .unwrap_or_default()
    }

    /// One past the last position of the subtree rooted at `start`.
    fn subtree_end(&self, start: usize) -> usize {
        let mut end = start + 1;
        while end < self.atoms.len() && self.descends_from(&self.atoms[end], Some(start)) {
            end += 1;
        }
        end
    }

    /// Whether `atom`, found while scanning forward from `ancestor`, is still inside the
    /// ancestor's subtree. Only valid for contiguous scans starting right after `ancestor`.
    fn descends_from(&self, atom: &Atom<O>, ancestor: Option<usize>) -> bool {
        match ancestor {
            // every atom descends from the virtual root
            None => true,
            Some(start) => atom
                .cause
                .and_then(|cause| self.index.get(&cause))
                .is_some_and(|&cause_pos| cause_pos >= start),
        }
    }

    /// Where an atom with the given cause belongs among the cause's existing children.
    fn insertion_slot(&self, id: &AtomId, cause: Option<AtomId>, cause_pos: Option<usize>) -> usize {
        let start = cause_pos.map_or(0, |p| p + 1);
        for (pos, existing) in self.atoms.iter().enumerate().skip(start) {
            if existing.cause == cause {
                if sibling_order(id, &existing.id) == Ordering::Less {
                    return pos;
                }
                // the sibling and its subtree stay ahead of us
                continue;
            }
            if !self.descends_from(existing, cause_pos) {
                return pos;
            }
        }
        self.atoms.len()
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, atom) in self.atoms.iter().enumerate().skip(start) {
            self.index.insert(atom.id, pos);
        }
    }

    /// Recompute the linearization from scratch (children sorted, depth-first) and compare.
    ///
    /// Also checks that the index matches and that every cause precedes its effects. Intended
    /// for tests, debugging, and snapshot loading.
    pub fn validate_invariants(&self) -> Result<()> {
        if self.index.len() != self.atoms.len() {
            return Err(Error::CorruptSnapshot("index size does not match atoms".into()));
        }
        for (pos, atom) in self.atoms.iter().enumerate() {
            if self.index.get(&atom.id) != Some(&pos) {
                return Err(Error::CorruptSnapshot(format!("index out of date for {}", atom.id)));
            }
            if let Some(cause) = &atom.cause {
                match self.index.get(cause) {
                    Some(&cause_pos) if cause_pos < pos => {}
                    _ => {
                        return Err(Error::CorruptSnapshot(format!(
                            "cause {cause} does not precede {}",
                            atom.id
                        )))
                    }
                }
            }
        }

        let mut children: HashMap<Option<AtomId>, Vec<AtomId>> = HashMap::new();
        for atom in &self.atoms {
            children.entry(atom.cause).or_default().push(atom.id);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(sibling_order);
        }

        let mut expected = Vec::with_capacity(self.atoms.len());
        let mut stack: Vec<AtomId> = children
            .get(&None)
            .map(|roots| roots.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            expected.push(id);
            if let Some(kids) = children.get(&Some(id)) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        if expected != self.ids() {
            return Err(Error::CorruptSnapshot("linearization is not canonical".into()));
        }
        Ok(())
    }
}

impl<O, V> Weave<O, V>
where
    O: Clone,
    V: Validator<O>,
{
    /// Attempt to add one atom.
    ///
    /// Rejections are returned as data; only a malformed atom produces an `Err`.
    pub fn insert(&mut self, atom: Atom<O>) -> Result<AddResult<O>> {
        atom.validate()?;

        if self.index.contains_key(&atom.id) {
            return Ok(AddResult::rejected(atom, RejectionReason::DuplicateAtom));
        }

        let cause_pos = match &atom.cause {
            None => None,
            Some(cause) => match self.index.get(cause) {
                Some(&pos) => Some(pos),
                None => return Ok(AddResult::rejected(atom, RejectionReason::CauseNotFound)),
            },
        };

        let cause_atom = cause_pos.map(|pos| &self.atoms[pos]);
        if !self.validator.validate(&atom, cause_atom) {
            return Ok(AddResult::rejected(atom, RejectionReason::InvalidOperation));
        }

        let slot = self.insertion_slot(&atom.id, atom.cause, cause_pos);
        self.atoms.insert(slot, atom.clone());
        self.reindex_from(slot);
        Ok(AddResult::Added(atom))
    }

    /// Insert each atom in order. Atoms whose cause is missing are reported, not retried, and a
    /// malformed atom is recorded in `failed` without stopping the rest of the batch.
    pub fn insert_batch(&mut self, atoms: impl IntoIterator<Item = Atom<O>>) -> AtomBatch<O> {
        let mut batch = AtomBatch::new();
        for atom in atoms {
            let id = atom.id;
            batch.record(id, self.insert(atom));
        }
        batch
    }

    /// Owned copies of the atoms `filter` accepts, in linearized order.
    pub fn delta<F: AtomFilter<O>>(&self, filter: &F) -> Vec<Atom<O>> {
        self.filter(filter).cloned().collect()
    }

    /// Atoms a peer with version vector `peer` has not seen, in linearized order.
    pub fn delta_for(&self, peer: &VersionVector) -> Vec<Atom<O>> {
        self.delta(&not_seen_by(peer))
    }
}

impl<O, V> Weave<O, V>
where
    O: Clone + Serialize,
    V: Validator<O>,
{
    /// Insert an atom only if its content matches the digest declared by the sender.
    pub fn insert_hashed(&mut self, atom: Atom<O>, declared_hash: &str) -> Result<AddResult<O>> {
        atom.validate()?;
        if atom.content_hash()? != declared_hash {
            return Ok(AddResult::rejected(atom, RejectionReason::ChecksumMismatch));
        }
        self.insert(atom)
    }
}

impl<'a, O, V> IntoIterator for &'a Weave<O, V> {
    type Item = &'a Atom<O>;
    type IntoIter = std::slice::Iter<'a, Atom<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}
