//! Benchmarks for the forecast and anomaly pipelines.

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use retail_pulse::core::{DailySeries, SeriesKey};
use retail_pulse::detection::{score_outliers, OutlierConfig};
use retail_pulse::models::{AdditiveModel, BatchConfig, BatchRunner, ForecastConfig};
use retail_pulse::seasonality::{decompose_series, DecompositionConfig};
use std::collections::BTreeMap;

fn generate_series(n: usize, level: f64) -> DailySeries {
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let dates = (0..n).map(|i| start + Duration::days(i as i64)).collect();
    let values = (0..n)
        .map(|i| {
            level
                + 3.0 * ((i % 7) as f64)
                + 8.0 * (2.0 * std::f64::consts::PI * i as f64 / 365.25).sin()
        })
        .collect();
    DailySeries::new(dates, values).unwrap()
}

fn generate_table(series: u32, days: usize) -> BTreeMap<SeriesKey, DailySeries> {
    (1..=series)
        .map(|item| (SeriesKey::new(1, item), generate_series(days, 20.0 + item as f64)))
        .collect()
}

fn bench_additive_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("additive_fit_predict");
    let config = ForecastConfig::default();

    for days in [365, 730, 1826].iter() {
        let series = generate_series(*days, 50.0);
        group.bench_with_input(BenchmarkId::from_parameter(days), days, |b, _| {
            b.iter(|| AdditiveModel::fit_predict(black_box(&config), black_box(&series)))
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_forecast");
    group.sample_size(10);

    for threads in [1, 4].iter() {
        let table = generate_table(16, 1095);
        let runner = BatchRunner::new(
            ForecastConfig::default(),
            BatchConfig::default().with_threads(*threads),
        );
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, _| {
            b.iter(|| runner.run(black_box(&table)))
        });
    }
    group.finish();
}

fn bench_anomaly(c: &mut Criterion) {
    let series = generate_series(1460, 100.0);
    let decomposition = decompose_series(&series, &DecompositionConfig::default()).unwrap();

    c.bench_function("decompose_1460", |b| {
        b.iter(|| decompose_series(black_box(&series), &DecompositionConfig::default()))
    });
    c.bench_function("score_outliers_1460", |b| {
        b.iter(|| score_outliers(black_box(&decomposition), &OutlierConfig::default()))
    });
}

criterion_group!(benches, bench_additive_fit, bench_batch, bench_anomaly);
criterion_main!(benches);
