//! Composable predicates for carving deltas out of a weave.
//!
//! Combined with [`crate::Weave::filter`], which walks the linearization, a filter is all that
//! is needed to compute what a peer is missing.

use crate::atom::Atom;
use crate::ids::{SiteId, Timestamp};
use crate::version_vector::VersionVector;

pub trait AtomFilter<O> {
    fn accepts(&self, atom: &Atom<O>) -> bool;
}

/// Boolean combinators. Kept apart from [`AtomFilter`] so building a filter never needs the
/// payload type spelled out.
pub trait FilterExt: Sized {
    fn and<F>(self, other: F) -> And<Self, F> {
        And(self, other)
    }

    fn or<F>(self, other: F) -> Or<Self, F> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<T> FilterExt for T {}

impl<O, F> AtomFilter<O> for F
where
    F: Fn(&Atom<O>) -> bool,
{
    fn accepts(&self, atom: &Atom<O>) -> bool {
        self(atom)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct And<A, B>(pub A, pub B);

impl<O, A: AtomFilter<O>, B: AtomFilter<O>> AtomFilter<O> for And<A, B> {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        self.0.accepts(atom) && self.1.accepts(atom)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Or<A, B>(pub A, pub B);

impl<O, A: AtomFilter<O>, B: AtomFilter<O>> AtomFilter<O> for Or<A, B> {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        self.0.accepts(atom) || self.1.accepts(atom)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Not<A>(pub A);

impl<O, A: AtomFilter<O>> AtomFilter<O> for Not<A> {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        !self.0.accepts(atom)
    }
}

/// Accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Everything;

impl<O> AtomFilter<O> for Everything {
    fn accepts(&self, _atom: &Atom<O>) -> bool {
        true
    }
}

pub fn any() -> Everything {
    Everything
}

/// Atoms newer than what `vector` records for their site.
#[derive(Clone, Copy, Debug)]
pub struct NotSeenBy<'a>(&'a VersionVector);

impl<O> AtomFilter<O> for NotSeenBy<'_> {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        !self.0.covers(&atom.id)
    }
}

pub fn not_seen_by(vector: &VersionVector) -> NotSeenBy<'_> {
    NotSeenBy(vector)
}

#[derive(Clone, Copy, Debug)]
pub struct FromSite(pub SiteId);

impl<O> AtomFilter<O> for FromSite {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        atom.id.site == self.0
    }
}

pub fn from_site(site: SiteId) -> FromSite {
    FromSite(site)
}

/// Atoms with a timestamp strictly greater than the bound.
#[derive(Clone, Copy, Debug)]
pub struct After(pub Timestamp);

impl<O> AtomFilter<O> for After {
    fn accepts(&self, atom: &Atom<O>) -> bool {
        atom.id.timestamp > self.0
    }
}

pub fn after(timestamp: Timestamp) -> After {
    After(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AtomId;

    fn atom(site: u32, ts: u64) -> Atom<()> {
        Atom::root(AtomId::new(SiteId(site), ts), ())
    }

    #[test]
    fn version_vector_filter_treats_missing_site_as_unseen() {
        let mut vv = VersionVector::new();
        vv.observe(AtomId::new(SiteId(1), 3));
        let f = not_seen_by(&vv);

        assert!(!f.accepts(&atom(1, 0)));
        assert!(!f.accepts(&atom(1, 3)));
        assert!(f.accepts(&atom(1, 4)));
        assert!(f.accepts(&atom(2, 0)));
    }

    #[test]
    fn combinators() {
        let f = from_site(SiteId(1)).and(after(2));
        assert!(f.accepts(&atom(1, 3)));
        assert!(!f.accepts(&atom(1, 2)));
        assert!(!f.accepts(&atom(2, 3)));

        let g = from_site(SiteId(1)).or(from_site(SiteId(2))).not();
        assert!(g.accepts(&atom(3, 0)));
        assert!(!g.accepts(&atom(2, 0)));

        let even = |a: &Atom<()>| a.id.timestamp % 2 == 0;
        let h = even.and(any());
        assert!(h.accepts(&atom(5, 4)));
        assert!(!h.accepts(&atom(5, 5)));
    }
}
