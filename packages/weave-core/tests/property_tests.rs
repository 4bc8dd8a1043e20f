use proptest::prelude::*;
use weave_core::{Atom, AtomId, SiteId, StateStore, VersionVector};
use weave_test_support::deliver_remote;

fn history() -> impl Strategy<Value = Vec<(usize, u32)>> {
    // (cause pick, site) per atom; pick 0 means "new root"
    prop::collection::vec((0usize..6, 1u32..4), 1..10)
}

fn build(shape: &[(usize, u32)]) -> Vec<Atom<usize>> {
    let mut atoms: Vec<Atom<usize>> = Vec::new();
    for (i, &(pick, site)) in shape.iter().enumerate() {
        let cause = if pick == 0 || i == 0 {
            None
        } else {
            Some(atoms[pick % i].id)
        };
        atoms.push(Atom::new(AtomId::new(SiteId(site), i as u64), cause, i));
    }
    atoms
}

proptest! {
    #[test]
    fn two_replicas_exchanging_deltas_converge(
        shape in history(),
        split in 0usize..10,
        reversed in any::<bool>(),
    ) {
        let atoms = build(&shape);
        let split = split.min(atoms.len());

        // replica a sees the prefix, replica b the suffix in some order, then they sync
        let mut a: StateStore<usize> = StateStore::new(SiteId(10));
        let mut b: StateStore<usize> = StateStore::new(SiteId(11));
        prop_assert!(deliver_remote(&mut a, atoms[..split].to_vec()).is_empty());
        let mut suffix = atoms[split..].to_vec();
        if reversed {
            suffix.reverse();
        }
        // b may be missing causes from a's prefix; it keeps them buffered until a's delta lands
        let mut pending_b = b.apply_remote(suffix).take_pending();

        for batch in a.export_delta(&VersionVector::new()) {
            pending_b.extend(b.apply_remote(batch.added).take_pending());
        }
        prop_assert!(deliver_remote(&mut b, pending_b).is_empty());
        for batch in b.export_delta(a.vector()) {
            prop_assert!(deliver_remote(&mut a, batch.added).is_empty());
        }

        prop_assert_eq!(a.weave().ids(), b.weave().ids());
        prop_assert_eq!(a.weave().len(), atoms.len());
        prop_assert_eq!(a.vector(), b.vector());
    }

    #[test]
    fn duplicate_delivery_is_idempotent(shape in history()) {
        let atoms = build(&shape);
        let mut store: StateStore<usize> = StateStore::new(SiteId(1));
        let first = store.apply_remote(atoms.clone());
        prop_assert_eq!(first.added.len(), atoms.len());
        let ids = store.weave().ids();

        let again = store.apply_remote(atoms.clone());
        prop_assert!(again.added.is_empty());
        prop_assert_eq!(again.summary().duplicate, atoms.len());
        prop_assert_eq!(store.weave().ids(), ids);
    }
}
