//! Classification and base tree benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cvsync_bench::populated_store;
use cvsync_core::{CancellationToken, ResourcePath, SyncClassifier};
use cvsync_reconcile::build_base_tree;

fn bench_build_base_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_base_tree");

    for (folders, files) in [(4, 25), (16, 100)] {
        let (_workspace, store) = populated_store(folders, files);
        let id = format!("{}x{}", folders, files);
        group.bench_function(BenchmarkId::from_parameter(id), |b| {
            b.iter(|| black_box(build_base_tree(&store, &ResourcePath::root()).unwrap()));
        });
    }

    group.finish();
}

fn bench_classify_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_tree");

    for (folders, files) in [(4, 25), (16, 100)] {
        let (_workspace, store) = populated_store(folders, files);
        let remote = build_base_tree(&store, &ResourcePath::root()).unwrap();
        let cancel = CancellationToken::new();
        let id = format!("{}x{}", folders, files);
        group.bench_function(BenchmarkId::from_parameter(id), |b| {
            let classifier = SyncClassifier::new(&store);
            b.iter(|| {
                black_box(
                    classifier
                        .classify_tree(&ResourcePath::root(), remote.as_ref(), &cancel)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_base_tree, bench_classify_tree);
criterion_main!(benches);
