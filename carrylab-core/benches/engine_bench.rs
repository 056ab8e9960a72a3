//! Criterion benchmarks for CarryLab hot paths.
//!
//! Benchmarks:
//! 1. Full simulation (precompute + bar loop)
//! 2. Bar loop alone over precomputed features
//! 3. Indicator precompute (ATR, realized vol, percentile rank, compression)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use carrylab_core::compression::{CompressionConfig, CompressionDetector};
use carrylab_core::domain::PriceSeries;
use carrylab_core::engine::StrategyConfig;
use carrylab_core::indicators::{atr, realized_volatility, volatility_percentile, AtrSmoothing};
use carrylab_core::Simulator;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> PriceSeries {
    let t0 = chrono::DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let close: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            20_000.0 + (t * 0.01).sin() * 2_000.0 + (t * 0.13).cos() * 150.0
        })
        .collect();
    PriceSeries::new(
        (0..n).map(|i| t0 + chrono::Duration::hours(i as i64)).collect(),
        close.iter().map(|c| c - 5.0).collect(),
        close.iter().map(|c| c + 40.0).collect(),
        close.iter().map(|c| c - 40.0).collect(),
        close.clone(),
        vec![1.0; n],
    )
    .unwrap()
    .with_funding((0..n).map(|i| 0.0001 * (i as f64 * 0.05).sin()).collect())
    .unwrap()
}

// ── 1. Full Simulation ───────────────────────────────────────────────

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    let sim = Simulator::new(StrategyConfig::default()).unwrap();

    for &bars in &[2_000, 8_760, 26_280] {
        let series = make_series(bars);
        group.bench_with_input(BenchmarkId::new("default_config", bars), &bars, |b, _| {
            b.iter(|| sim.run(black_box(&series)))
        });
    }

    group.finish();
}

// ── 2. Bar Loop ──────────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_loop");
    let sim = Simulator::new(StrategyConfig::default()).unwrap();
    let series = make_series(8_760);
    let features = sim.features(&series).unwrap();

    group.bench_function("precomputed_8760_bars", |b| {
        b.iter(|| sim.run_with_features(black_box(&series), black_box(&features)))
    });

    group.finish();
}

// ── 3. Indicator Precompute ──────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_precompute");
    let series = make_series(8_760);
    let returns: Vec<f64> = series
        .close()
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    let detector = CompressionDetector::new(CompressionConfig::default()).unwrap();

    group.bench_function("atr_14", |b| {
        b.iter(|| {
            atr(
                black_box(series.high()),
                black_box(series.low()),
                black_box(series.close()),
                14,
                AtrSmoothing::Wilder,
            )
        })
    });
    group.bench_function("realized_vol_20", |b| {
        b.iter(|| realized_volatility(black_box(&returns), 20, 1.0, false))
    });
    group.bench_function("vol_percentile_252", |b| {
        b.iter(|| volatility_percentile(black_box(&returns), 252))
    });
    group.bench_function("compression_score", |b| {
        b.iter(|| {
            detector.compression_score(
                black_box(series.high()),
                black_box(series.low()),
                black_box(series.close()),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_simulation, bench_bar_loop, bench_indicators);
criterion_main!(benches);
