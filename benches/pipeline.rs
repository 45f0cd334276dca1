use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spate_tsdb::pipeline::{CollectingSink, GroupByTime, MeanAccumulator, SlidingWindow, SpaceSaver};
use spate_tsdb::query::{QueryProcessor, ScanQuery};
use spate_tsdb::types::Sample;
use spate_tsdb::Operator;

fn create_dense_samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| Sample::float((i % 16) as u64, i as u64, 100.0 + (i as f64 * 0.5)))
        .collect()
}

fn bench_windowed_mean(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowed_mean");

    for size in [1_000, 10_000, 100_000].iter() {
        let samples = create_dense_samples(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let window =
                    SlidingWindow::<MeanAccumulator>::new(Box::new(CollectingSink::new()));
                let mut query =
                    ScanQuery::new(Box::new(window), vec![], 0, u64::MAX, GroupByTime::new(64));
                query.start();
                for sample in &samples {
                    query.put(black_box(sample));
                }
                query.stop();
                black_box(query.stats().barriers_injected)
            });
        });
    }

    group.finish();
}

fn bench_frequent_items(c: &mut Criterion) {
    let mut group = c.benchmark_group("frequent_items");

    for size in [1_000, 10_000, 100_000].iter() {
        let samples = create_dense_samples(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut saver =
                    SpaceSaver::frequent_items(0.01, 0.1, Box::new(CollectingSink::new()))
                        .unwrap();
                for sample in &samples {
                    saver.put(black_box(sample));
                }
                saver.complete();
                black_box(saver.counter_count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_windowed_mean, bench_frequent_items);
criterion_main!(benches);
