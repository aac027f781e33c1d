//! Performance benchmarks for the network speed tester
//!
//! Covers the hot paths of a run: statistics over samples, live metrics
//! updates, AIM scoring, display formatting and a whole engine run over the
//! scripted transport.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use network_speed_tester::{
    client::{MockBehavior, MockTransport},
    engine::LiveMetricsStore,
    output::{format_latency, format_speed, OutputFormatter, OutputFormatterFactory},
    stats::{self, aim, RollingLatencyStats},
    SpeedTestEngine, TestConfiguration, TransferDirection,
};
use std::sync::Arc;
use std::time::Duration;

/// Latency samples with a little spread
fn sample_latencies(count: usize) -> Vec<f64> {
    (0..count).map(|i| 20.0 + (i % 17) as f64 * 0.75).collect()
}

fn benchmark_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [10, 100, 1000].iter() {
        let samples = sample_latencies(*size);

        group.bench_with_input(BenchmarkId::new("mean_and_std_dev", size), size, |b, _| {
            b.iter(|| {
                let mean = stats::mean(black_box(&samples));
                let jitter = stats::population_std_dev(black_box(&samples));
                black_box((mean, jitter))
            })
        });

        group.bench_with_input(BenchmarkId::new("rolling", size), size, |b, _| {
            b.iter(|| {
                let mut rolling = RollingLatencyStats::new();
                for (i, sample) in samples.iter().enumerate() {
                    if i % 25 == 0 {
                        rolling.add_loss();
                    } else {
                        rolling.add_sample(*sample);
                    }
                }
                black_box((rolling.average(), rolling.jitter(), rolling.loss_percent()))
            })
        });
    }

    let speeds: Vec<f64> = (0..32).map(|i| if i % 8 == 0 { 0.0 } else { 1e6 * i as f64 }).collect();
    group.bench_function("mean_of_successful", |b| {
        b.iter(|| black_box(stats::mean_of_successful(black_box(&speeds))))
    });

    group.finish();
}

fn benchmark_live_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_metrics");

    group.bench_function("record_speed", |b| {
        let store = LiveMetricsStore::new(20);
        store.begin_run();
        let mut speed = 1e6;
        b.iter(|| {
            speed += 1.0;
            store.record_speed(TransferDirection::Download, black_box(speed));
        })
    });

    group.bench_function("snapshot", |b| {
        let store = LiveMetricsStore::new(20);
        store.begin_run();
        for i in 0..20 {
            store.record_speed(TransferDirection::Upload, 1e5 * i as f64);
        }
        b.iter(|| black_box(store.snapshot()))
    });

    group.finish();
}

fn benchmark_scoring_and_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring_and_formatting");
    group.bench_function("aim_scores", |b| {
        b.iter(|| black_box(aim::score_metrics(black_box(100.0), black_box(20.0), black_box(24.0), black_box(4.0))))
    });

    group.bench_function("format_units", |b| {
        b.iter(|| {
            black_box(format_speed(black_box(12_500_000.0), true));
            black_box(format_latency(black_box(24.3)))
        })
    });

    let formatter = OutputFormatterFactory::create_plain_formatter();
    let store = LiveMetricsStore::new(20);
    store.begin_run();
    store.record_speed(TransferDirection::Download, 12_500_000.0);
    let metrics = store.snapshot();
    group.bench_function("progress_line", |b| {
        b.iter(|| black_box(formatter.format_progress(black_box(&metrics))))
    });

    group.finish();
}

fn benchmark_engine_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.sample_size(20);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to build runtime: {}", e),
    };

    for connections in [1u32, 4, 16].iter() {
        let config = TestConfiguration {
            download_sizes: vec![100_000, 1_000_000],
            upload_sizes: vec![100_000],
            latency_samples: 5,
            concurrent_connections: *connections,
            latency_interval_ms: 0,
            inter_size_delay_ms: 0,
            ..TestConfiguration::default()
        };
        let transport = Arc::new(
            MockTransport::new().with_download(MockBehavior::default().with_elapsed(Duration::from_millis(80))),
        );
        let engine = SpeedTestEngine::new(config, transport);

        group.bench_with_input(BenchmarkId::new("mock_run", connections), connections, |b, _| {
            b.iter(|| black_box(runtime.block_on(engine.run_test())))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_statistics,
    benchmark_live_metrics,
    benchmark_scoring_and_formatting,
    benchmark_engine_run
);
criterion_main!(benches);
