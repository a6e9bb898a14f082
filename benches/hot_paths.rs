//! Hot path benchmarks for the flush loop.
//!
//! Run with: `cargo bench --bench hot_paths`
//!
//! A busy minute bucket can hold thousands of appended values; decoding
//! and aggregating them, and matching keys against the bucket pattern,
//! dominate flush time.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use minute_metrics::accumulator::{
    encode_header, encode_value, AccumulatorRecord, AggregationOp, MetricValue, ValueKind,
};
use minute_metrics::store::glob_match;

fn build_record(kind: ValueKind, samples: usize) -> String {
    let mut raw = encode_header("latency", AggregationOp::Avg, kind);
    for i in 0..samples {
        let value = match kind {
            ValueKind::Int => MetricValue::Int(i as i64),
            ValueKind::Float => MetricValue::Float(i as f64 * 0.5),
        };
        raw.push_str(&encode_value(value));
    }
    raw
}

/// Benchmark decode + aggregate of one bucket record
fn bench_decode_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_aggregate");

    for samples in [10, 1_000, 10_000] {
        group.throughput(Throughput::Elements(samples as u64));
        for kind in [ValueKind::Int, ValueKind::Float] {
            let raw = build_record(kind, samples);
            group.bench_function(format!("{}_{}", kind, samples), |b| {
                b.iter(|| {
                    let record = AccumulatorRecord::decode(black_box(&raw)).unwrap();
                    record.aggregate(black_box(1704067200)).unwrap()
                })
            });
        }
    }

    group.finish();
}

/// Benchmark KEYS-style pattern matching
fn bench_glob_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob_match");
    group.throughput(Throughput::Elements(1));

    let pattern = "accumulator_1704067200_*";
    group.bench_function("hit", |b| {
        b.iter(|| glob_match(black_box("accumulator_1704067200_http.requests"), pattern))
    });
    group.bench_function("miss", |b| {
        b.iter(|| glob_match(black_box("accumulator_1704067260_http.requests"), pattern))
    });

    group.finish();
}

criterion_group!(benches, bench_decode_aggregate, bench_glob_match);
criterion_main!(benches);
