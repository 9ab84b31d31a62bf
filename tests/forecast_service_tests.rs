use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};

use stocktime::config::TimeframePolicyTable;
use stocktime::error::ForecastError;
use stocktime::forecast::{
    ForecastStrategy, RecurrentCore, SequenceForecaster, StochasticForecaster,
};
use stocktime::market_data::{BarRange, MarketDataProvider};
use stocktime::model::{Candle, InstrumentClass, Timeframe};
use stocktime::service::ForecastService;
use stocktime::tracker::{PredictionStore, PredictionTracker};

struct StaticBars(Vec<Candle>);

impl MarketDataProvider for StaticBars {
    fn fetch_bars(
        &self,
        _instrument: InstrumentClass,
        _symbol: &str,
        _interval: &str,
        _range: BarRange,
    ) -> Result<Vec<Candle>> {
        Ok(self.0.clone())
    }
}

/// Repeats the last value of the window.
struct Persistence;

impl RecurrentCore for Persistence {
    fn next_value(&self, window: &[f64]) -> f64 {
        window[window.len() - 1]
    }
}

fn daily_bars(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp_millis() as u64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: start + i as u64 * 86_400_000,
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        })
        .collect()
}

fn service(name: &str, bars: Vec<Candle>) -> ForecastService<StaticBars, Persistence> {
    let provider = Arc::new(StaticBars(bars));
    let policies = Arc::new(TimeframePolicyTable::default());
    let path = std::env::temp_dir()
        .join(format!("stocktime-service-{}-{}", name, uuid::Uuid::new_v4()))
        .join("predictions.sqlite");
    let tracker = PredictionTracker::new(
        PredictionStore::open(&path).expect("open store"),
        provider.clone(),
        policies.clone(),
        300_000,
    );
    ForecastService::new(
        provider,
        policies.clone(),
        SequenceForecaster::new(Persistence, 4).unwrap(),
        StochasticForecaster::new(policies, Some(11)),
        tracker,
    )
}

#[test]
/// A random-walk forecast uses the daily horizon, schedules one target per
/// day, and persists every point.
fn random_walk_forecast_is_scheduled_and_stored() {
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
    let svc = service("walk", daily_bars(&closes));
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    let outcome = svc
        .forecast_at(now, "AAPL", InstrumentClass::Equity, Timeframe::OneDay, ForecastStrategy::RandomWalk)
        .expect("forecast should succeed");
    assert_eq!(outcome.historical_prices, closes);
    assert_eq!(outcome.predictions.len(), 7);
    assert_eq!(outcome.record_ids.len(), 7);
    assert_eq!(outcome.predictions.issued_at(), now);
    assert_eq!(outcome.predictions.points()[6].target_time, now + Duration::days(7));

    let stored = svc
        .tracker()
        .record_store()
        .load_window("AAPL", InstrumentClass::Equity, Timeframe::OneDay, now - Duration::days(1))
        .unwrap();
    assert_eq!(stored.len(), 7);
}

#[test]
fn sequence_forecast_maps_back_to_prices() {
    let svc = service("sequence", daily_bars(&[10.0, 12.0, 11.0, 13.0, 14.0]));
    let outcome = svc
        .forecast("BTC-USD", InstrumentClass::Crypto, Timeframe::OneDay, ForecastStrategy::Sequence)
        .expect("forecast should succeed");
    // Persistence repeats the last normalized value, so prices repeat the last close.
    assert!(outcome.predictions.prices().iter().all(|p| (p - 14.0).abs() < 1e-9));
}

#[test]
fn empty_market_data_is_reported() {
    let svc = service("empty", Vec::new());
    let err = svc
        .forecast("NOPE", InstrumentClass::Equity, Timeframe::FiveMin, ForecastStrategy::RandomWalk)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ForecastError>(),
        Some(&ForecastError::NoMarketData {
            symbol: "NOPE".to_string(),
            interval: "5m".to_string(),
        })
    );
}

#[test]
fn unordered_bars_are_rejected() {
    let mut bars = daily_bars(&[1.0, 2.0, 3.0]);
    bars.swap(1, 2);
    let svc = service("unordered", bars);
    let err = svc
        .forecast("AAPL", InstrumentClass::Equity, Timeframe::OneDay, ForecastStrategy::RandomWalk)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ForecastError>(),
        Some(ForecastError::UnorderedSeries { .. })
    ));
}

#[test]
/// 100 daily closes through the sequence path: 7 pending records whose
/// targets advance by exactly one day.
fn hundred_daily_closes_produce_seven_pending_records() {
    let closes: Vec<f64> = (0..100)
        .map(|i| 150.0 + (i as f64 * 0.2).sin() * 10.0 + i as f64 * 0.1)
        .collect();
    let svc = service("e2e", daily_bars(&closes));
    let now = Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap();

    let outcome = svc
        .forecast_at(now, "MSFT", InstrumentClass::Equity, Timeframe::OneDay, ForecastStrategy::Sequence)
        .expect("forecast should succeed");
    assert_eq!(outcome.historical_prices.len(), 100);

    let mut records = svc
        .tracker()
        .record_store()
        .load_window("MSFT", InstrumentClass::Equity, Timeframe::OneDay, now - Duration::days(1))
        .unwrap();
    records.sort_by_key(|r| r.target_time);
    assert_eq!(records.len(), 7);
    for pair in records.windows(2) {
        assert_eq!(pair[1].target_time - pair[0].target_time, Duration::days(1));
    }
    assert_eq!(records[0].target_time, now + Duration::days(1));
    assert!(records.iter().all(|r| r.actual_price.is_none() && r.error_percentage.is_none()));
}
