//! Fixtures shared by the weave test suites, and a conformance suite every
//! [`SnapshotStore`] backend runs against itself.

use weave_core::{Atom, AtomBatch, AtomId, Op, SiteId, Snapshot, SnapshotStore, StateStore, Weave};

pub fn id(site: u32, timestamp: u64) -> AtomId {
    AtomId::new(SiteId(site), timestamp)
}

/// Every ordering of `items`, generated with Heap's algorithm.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut [T], out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.to_vec());
            return;
        }
        heap(k - 1, items, out);
        for i in 0..(k - 1) {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap(k - 1, items, out);
        }
    }

    let mut out = Vec::new();
    heap(items.len(), &mut items.to_vec(), &mut out);
    out
}

/// Insert `atoms` in the given order, resubmitting atoms whose cause was missing until a pass
/// makes no progress. Returns the atoms that never found their cause.
pub fn deliver<O: Clone>(weave: &mut Weave<O>, atoms: Vec<Atom<O>>) -> Vec<Atom<O>> {
    let mut pending = atoms;
    loop {
        let before = pending.len();
        let mut batch: AtomBatch<O> = weave.insert_batch(pending);
        assert!(batch.failed.is_empty(), "unexpected failures: {:?}", batch.failed);
        pending = batch.take_pending();
        if pending.is_empty() || pending.len() == before {
            return pending;
        }
    }
}

/// [`deliver`] through a replica, so its version vector follows the atoms that land.
pub fn deliver_remote<O: Clone>(store: &mut StateStore<O>, atoms: Vec<Atom<O>>) -> Vec<Atom<O>> {
    let mut pending = atoms;
    loop {
        let before = pending.len();
        let mut batch = store.apply_remote(pending);
        assert!(batch.failed.is_empty(), "unexpected failures: {:?}", batch.failed);
        pending = batch.take_pending();
        if pending.is_empty() || pending.len() == before {
            return pending;
        }
    }
}

/// A small document from two sites: one object with a tag, two concurrent values, and a delete.
pub fn sample_ops() -> Snapshot<Op> {
    let mut store: StateStore<Op> = StateStore::new(SiteId(1));
    let object = store.mint(None, Op::object("card")).map(|r| r.atom().id).unwrap();
    let tag = store.mint(Some(object), Op::tag("title")).map(|r| r.atom().id).unwrap();
    store.mint(Some(tag), Op::value("draft")).unwrap();
    store.apply_remote(vec![
        Atom::child(id(2, 3), tag, Op::value(serde_json::json!({"text": "final"}))),
        Atom::child(id(2, 4), object, Op::Delete),
    ]);
    store.export_state()
}

pub mod conformance {
    //! Checks any snapshot store must pass. Each takes a fresh, empty store.

    use super::*;

    pub fn empty_store_loads_nothing<S: SnapshotStore<Op>>(store: S) {
        assert_eq!(store.load().unwrap(), None);
    }

    pub fn save_then_load_round_trips<S: SnapshotStore<Op>>(mut store: S) {
        let snapshot = sample_ops();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    pub fn save_replaces_previous_snapshot<S: SnapshotStore<Op>>(mut store: S) {
        store.save(&sample_ops()).unwrap();

        let mut smaller: StateStore<Op> = StateStore::new(SiteId(3));
        smaller.mint(None, Op::object("other")).unwrap();
        let replacement = smaller.export_state();
        store.save(&replacement).unwrap();

        assert_eq!(store.load().unwrap(), Some(replacement));
    }

    pub fn empty_snapshot_round_trips<S: SnapshotStore<Op>>(mut store: S) {
        store.save(&Snapshot::empty()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.version.is_empty());
    }

    /// Run every check, building a fresh store for each.
    pub fn run_all<S: SnapshotStore<Op>>(mut fresh: impl FnMut() -> S) {
        empty_store_loads_nothing(fresh());
        save_then_load_round_trips(fresh());
        save_replaces_previous_snapshot(fresh());
        empty_snapshot_round_trips(fresh());
    }
}
