//! End-to-end runs of the anomaly and forecast pipelines.

use chrono::{Datelike, Duration, NaiveDate};
use retail_pulse::cache::PipelineCache;
use retail_pulse::config::PipelineConfig;
use retail_pulse::core::{DailySeries, SeriesKey};
use retail_pulse::dashboard::{AnomalySession, ForecastSession};
use retail_pulse::detection::Direction;
use retail_pulse::io::{SalesRecord, StoreItemRecord};
use retail_pulse::models::{AdditiveModel, ForecastConfig, Forecaster};
use retail_pulse::utils::{backtest_additive, BacktestConfig};
use retail_pulse::PipelineError;

fn weekly_demand(i: i64, base: f64) -> f64 {
    let weekday = [0.0, 2.0, 4.0, 3.0, 6.0, 9.0, 5.0][(i % 7) as usize];
    let yearly = 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 365.25).sin();
    base + 0.01 * i as f64 + weekday + yearly
}

fn store_item_table(keys: &[(u32, u32)], start: NaiveDate, days: i64) -> Vec<StoreItemRecord> {
    keys.iter()
        .flat_map(|&(store, item)| {
            (0..days).map(move |i| StoreItemRecord {
                date: start + Duration::days(i),
                store,
                item,
                sales: weekly_demand(i, 10.0 * store as f64 + item as f64),
            })
        })
        .collect()
}

#[test]
fn single_spike_is_top_ranked_as_spike() {
    let start = NaiveDate::from_ymd_opt(2016, 5, 1).unwrap();
    let records: Vec<SalesRecord> = (0..60)
        .map(|i| SalesRecord {
            date: start + Duration::days(i),
            sales: if i == 30 { 10_000.0 } else { 100.0 },
        })
        .collect();

    let session =
        AnomalySession::from_records(&records, &PipelineConfig::default(), &PipelineCache::new())
            .unwrap();

    let spike_date = start + Duration::days(30);
    let top = session.top_anomalies();
    assert!(!top.is_empty());
    assert_eq!(top[0].point.date, spike_date);
    assert_eq!(top[0].direction, Some(Direction::Spike));
    assert!(session
        .scores
        .points
        .iter()
        .filter(|p| p.date != spike_date)
        .all(|p| p.anomaly_score < top[0].point.anomaly_score));
}

#[test]
fn sparse_log_is_filled_with_zero_days() {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
    let records: Vec<SalesRecord> = (0..40)
        .filter(|i| i % 5 != 2)
        .map(|i| SalesRecord {
            date: start + Duration::days(i),
            sales: 50.0 + (i % 7) as f64,
        })
        .collect();

    let session =
        AnomalySession::from_records(&records, &PipelineConfig::default(), &PipelineCache::new())
            .unwrap();

    assert_eq!(session.grid.len(), 40);
    assert_eq!(session.grid.values()[2], 0.0);
    assert_eq!(session.scores.points.len(), 40);
    assert!(session.anomalies.iter().all(|a| a.point.is_anomaly));
}

#[test]
fn three_year_table_forecasts_a_year_per_series() {
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let days = 3 * 365;
    let records = store_item_table(&[(1, 1), (1, 2)], start, days);

    let session =
        ForecastSession::from_records(&records, &PipelineConfig::default(), &PipelineCache::new())
            .unwrap();

    assert!(session.failures().is_empty());
    for key in session.keys() {
        let forecast = session.forecasts().get(&key).unwrap();
        assert_eq!(forecast.len(), days as usize + 365);
        assert_eq!(forecast.history_len(), days as usize);

        let last = forecast.dates().last().copied().unwrap();
        assert_eq!(last, start + Duration::days(days - 1 + 365));
        for row in forecast.rows() {
            assert!(row.lower <= row.point && row.point <= row.upper);
        }
    }
    assert_eq!(session.forecasts().row_count(), 2 * (days as usize + 365));
}

#[test]
fn long_history_enables_yearly_seasonality() {
    let start = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..800).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = (0..800).map(|i| weekly_demand(i, 40.0)).collect();
    let series = DailySeries::new(dates, values).unwrap();

    let mut model = AdditiveModel::new(ForecastConfig::default().with_horizon(30));
    model.fit(&series).unwrap();
    assert_eq!(model.seasonality_orders(), Some((10, 3)));

    let short = series.before(start + Duration::days(100));
    let mut model = AdditiveModel::new(ForecastConfig::default().with_horizon(30));
    model.fit(&short).unwrap();
    assert_eq!(model.seasonality_orders(), Some((0, 3)));
}

#[test]
fn default_backtest_covers_two_folds() {
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..1500).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = (0..1500).map(|i| weekly_demand(i, 30.0)).collect();
    let series = DailySeries::new(dates, values).unwrap();

    let result =
        backtest_additive(&BacktestConfig::default(), &ForecastConfig::default(), &series).unwrap();

    assert_eq!(result.n_folds(), 2);
    assert_eq!(result.folds[0].cutoff, start + Duration::days(1095));
    assert_eq!(result.folds[1].cutoff, start + Duration::days(1275));
    for fold in &result.folds {
        assert_eq!(fold.points.len(), 90);
        assert!(fold.points.iter().all(|p| p.date >= fold.cutoff));
    }

    let horizons: Vec<usize> = result.metrics.iter().map(|m| m.horizon).collect();
    assert_eq!(horizons, (1..=90).collect::<Vec<_>>());
    for row in &result.metrics {
        assert!(row.rmse.is_finite() && row.rmse >= 0.0);
        assert!(row.smape < 0.5);
        assert!((0.0..=1.0).contains(&row.coverage));
    }
}

#[test]
fn backtest_from_forecast_session_uses_smallest_key() {
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let records = store_item_table(&[(2, 1), (1, 3)], start, 200);

    let mut config = PipelineConfig::default();
    config.forecast.horizon = 30;
    config.backtest = BacktestConfig::new(120, 30, 14);

    let mut session = ForecastSession::from_records(&records, &config, &PipelineCache::new()).unwrap();
    let view = session.run_backtest(None).unwrap();

    assert_eq!(view.key, SeriesKey::new(1, 3));
    assert_eq!(view.result.n_folds(), 3);
    assert_eq!(view.metrics().len(), 14);
}

#[test]
fn weekday_profile_survives_into_forecast() {
    let start = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..120).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = dates
        .iter()
        .map(|d| if d.weekday().number_from_monday() >= 6 { 80.0 } else { 40.0 })
        .collect();
    let series = DailySeries::new(dates, values).unwrap();

    let forecast =
        AdditiveModel::fit_predict(&ForecastConfig::default().with_horizon(14), &series).unwrap();

    for row in forecast.out_of_sample() {
        let weekend = row.date.weekday().number_from_monday() >= 6;
        if weekend {
            assert!(row.point > 60.0, "{} -> {}", row.date, row.point);
        } else {
            assert!(row.point < 60.0, "{} -> {}", row.date, row.point);
        }
    }
}

#[test]
fn empty_inputs_report_data_unavailable() {
    let cache = PipelineCache::new();
    let config = PipelineConfig::default();

    assert!(matches!(
        AnomalySession::from_records(&[], &config, &cache),
        Err(PipelineError::DataUnavailable(_))
    ));
    assert!(matches!(
        ForecastSession::from_records(&[], &config, &cache),
        Err(PipelineError::DataUnavailable(_))
    ));
}
