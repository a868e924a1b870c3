//! Normalization benchmarks for socbox-ingest.
//!
//! Measures record normalization for nested and flat source layouts and the
//! cost of loading a normalized corpus back from NDJSON.


use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use socbox_ingest::{Corpus, normalize_records};

// ---------------------------------------------------------------------------
// Benchmark: normalize N nested / flat records
// ---------------------------------------------------------------------------

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_records");

    for n in [100, 1000, 10_000] {
        let nested = datagen::gen_nested_records(n);
        group.bench_with_input(BenchmarkId::new("nested", n), &nested, |b, records| {
            b.iter(|| black_box(normalize_records(black_box(records), "bench")));
        });

        let flat = datagen::gen_flat_records(n);
        group.bench_with_input(BenchmarkId::new("flat", n), &flat, |b, records| {
            b.iter(|| black_box(normalize_records(black_box(records), "bench")));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: corpus NDJSON load
// ---------------------------------------------------------------------------

fn bench_corpus_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("corpus_from_ndjson");
    group.sample_size(20);

    for n in [1000, 10_000] {
        let normalized = normalize_records(&datagen::gen_nested_records(n), "bench");
        let mut buf = Vec::new();
        Corpus::new(normalized.events).write_ndjson(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        group.throughput(criterion::Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("events", n), &text, |b, text| {
            b.iter(|| black_box(Corpus::from_ndjson_str(black_box(text)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_corpus_load);
criterion_main!(benches);
