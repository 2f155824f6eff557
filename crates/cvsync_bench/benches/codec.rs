//! Entries codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cvsync_bench::generate_records;
use cvsync_codec::{decode_entries, encode_entries, entry_line, ResourceSyncInfo};

fn bench_entry_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_line");

    group.bench_function("checked_out", |b| {
        let record = ResourceSyncInfo::new("Makefile", "1.12", None).with_keyword_mode(Some("-kb".into()));
        b.iter(|| black_box(entry_line(black_box(&record)).unwrap()));
    });

    group.bench_function("added", |b| {
        let record = ResourceSyncInfo::added("new.c");
        b.iter(|| black_box(entry_line(black_box(&record)).unwrap()));
    });

    group.finish();
}

fn bench_encode_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_entries");

    for count in [10, 100, 1000] {
        let records = generate_records(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| black_box(encode_entries(records.iter()).unwrap()));
        });
    }

    group.finish();
}

fn bench_decode_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_entries");

    for count in [10, 100, 1000] {
        let bytes = encode_entries(generate_records(count).iter()).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| black_box(decode_entries(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_entry_line, bench_encode_entries, bench_decode_entries);
criterion_main!(benches);
