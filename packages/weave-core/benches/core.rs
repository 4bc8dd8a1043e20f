use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weave_core::{Atom, AtomId, SiteId, VersionVector, Weave};

/// A root with `count` concurrent children spread over four sites.
fn siblings(count: u64) -> Vec<Atom<u64>> {
    let root = AtomId::new(SiteId(0), 0);
    let mut atoms = vec![Atom::root(root, 0)];
    for i in 0..count {
        atoms.push(Atom::child(AtomId::new(SiteId((i % 4) as u32 + 1), i / 4 + 1), root, i));
    }
    atoms
}

/// A single chain, the shape of uninterrupted typing.
fn chain(count: u64) -> Vec<Atom<u64>> {
    let mut atoms = vec![Atom::root(AtomId::new(SiteId(1), 0), 0)];
    for i in 1..=count {
        atoms.push(Atom::child(AtomId::new(SiteId(1), i), AtomId::new(SiteId(1), i - 1), i));
    }
    atoms
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for count in [100u64, 1_000, 5_000] {
        let wide = siblings(count);
        group.bench_with_input(BenchmarkId::new("siblings", count), &wide, |b, atoms| {
            b.iter(|| {
                let mut weave = Weave::new();
                black_box(weave.insert_batch(atoms.iter().cloned()))
            })
        });

        let deep = chain(count);
        group.bench_with_input(BenchmarkId::new("chain", count), &deep, |b, atoms| {
            b.iter(|| {
                let mut weave = Weave::new();
                black_box(weave.insert_batch(atoms.iter().cloned()))
            })
        });
    }
    group.finish();
}

fn bench_delta(c: &mut Criterion) {
    let mut weave = Weave::new();
    weave.insert_batch(siblings(5_000));
    let peer: VersionVector = [(SiteId(0), 0), (SiteId(1), 600), (SiteId(3), 1_200)]
        .into_iter()
        .collect();
    c.bench_function("delta_for/5000", |b| b.iter(|| black_box(weave.delta_for(&peer))));
}

criterion_group!(benches, bench_insert, bench_delta);
criterion_main!(benches);
