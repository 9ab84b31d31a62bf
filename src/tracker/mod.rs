pub mod stats;
pub mod store;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::TimeframePolicyTable;
use crate::forecast::ForecastBatch;
use crate::market_data::{BarRange, MarketDataProvider};
use crate::model::{InstrumentClass, Timeframe};

pub use stats::{error_percentage, statistics, AccuracyStatistics};
pub use store::{NewPrediction, PredictionRecord, PredictionStore, ReconciliationStatus};

/// Outcome counters of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Pending records whose target time had passed.
    pub examined: usize,
    pub resolved: usize,
    pub pending: usize,
    pub failed_lookups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingReport {
    pub ticker: String,
    pub market_type: InstrumentClass,
    pub timeframe: Timeframe,
    pub lookback_days: u32,
    pub reconcile: ReconcileSummary,
    pub predictions: Vec<PredictionRecord>,
    pub statistics: AccuracyStatistics,
}

/// Persists forecasts and later scores them against realized closes.
pub struct PredictionTracker<P: MarketDataProvider> {
    store: PredictionStore,
    provider: P,
    policies: Arc<TimeframePolicyTable>,
    match_tolerance_ms: u64,
}

impl<P: MarketDataProvider> PredictionTracker<P> {
    pub fn new(
        store: PredictionStore,
        provider: P,
        policies: Arc<TimeframePolicyTable>,
        match_tolerance_ms: u64,
    ) -> Self {
        Self {
            store,
            provider,
            policies,
            match_tolerance_ms,
        }
    }

    pub fn record_store(&self) -> &PredictionStore {
        &self.store
    }

    /// Persists every point of `batch` as a pending record.
    pub fn store(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        batch: &ForecastBatch,
    ) -> Result<Vec<i64>> {
        let rows: Vec<NewPrediction> = batch
            .points()
            .iter()
            .map(|point| NewPrediction {
                ticker: ticker.to_string(),
                market_type,
                prediction_time: batch.issued_at(),
                target_time: point.target_time,
                predicted_price: point.price,
                timeframe: batch.timeframe(),
            })
            .collect();
        let ids = self.store.insert_batch(&rows, Utc::now())?;
        tracing::info!(
            ticker,
            market_type = %market_type,
            timeframe = %batch.timeframe(),
            count = ids.len(),
            "Stored predictions"
        );
        Ok(ids)
    }

    pub fn store_prices(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        prices: &[f64],
        timeframe: Timeframe,
    ) -> Result<Vec<i64>> {
        self.store_prices_at(Utc::now(), ticker, market_type, prices, timeframe)
    }

    /// Schedules raw prices from `now` using the timeframe's target interval
    /// and stores them.
    pub fn store_prices_at(
        &self,
        now: DateTime<Utc>,
        ticker: &str,
        market_type: InstrumentClass,
        prices: &[f64],
        timeframe: Timeframe,
    ) -> Result<Vec<i64>> {
        let interval_ms = self.policies.get(timeframe).target_interval_ms()?;
        let batch = ForecastBatch::schedule(prices, timeframe, now, interval_ms);
        self.store(ticker, market_type, &batch)
    }

    pub fn reconcile(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<ReconcileSummary> {
        self.reconcile_at(Utc::now(), ticker, market_type, timeframe, lookback_days)
    }

    /// Fills in realized prices for due records issued in the last
    /// `lookback_days`. A failed lookup leaves its record pending and does
    /// not abort the pass.
    pub fn reconcile_at(
        &self,
        now: DateTime<Utc>,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<ReconcileSummary> {
        let cutoff = now - Duration::days(i64::from(lookback_days));
        let records = self
            .store
            .load_window(ticker, market_type, timeframe, cutoff)?;
        let policy = self.policies.get(timeframe);
        let interval = policy.bar_interval.clone();
        let tolerance_ms = policy.match_tolerance_ms(self.match_tolerance_ms)?;

        let mut summary = ReconcileSummary::default();
        for record in records.iter().filter(|r| r.is_due(now)) {
            summary.examined += 1;
            let actual = match self.realized_close(record, &interval, tolerance_ms) {
                Ok(Some(actual)) => actual,
                Ok(None) => {
                    tracing::debug!(id = record.id, target = %record.target_time, "No bar near target yet");
                    summary.pending += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(id = record.id, ticker, error = %e, "Realized price lookup failed");
                    summary.failed_lookups += 1;
                    summary.pending += 1;
                    continue;
                }
            };
            let Some(err_pct) = error_percentage(record.predicted_price, actual) else {
                tracing::warn!(
                    id = record.id,
                    predicted = record.predicted_price,
                    actual,
                    "Cannot score prediction"
                );
                summary.pending += 1;
                continue;
            };
            if self.store.resolve(record.id, actual, err_pct)? {
                summary.resolved += 1;
            } else {
                tracing::debug!(id = record.id, "Record already resolved elsewhere");
            }
        }

        if summary.examined > 0 {
            tracing::info!(
                ticker,
                timeframe = %timeframe,
                examined = summary.examined,
                resolved = summary.resolved,
                pending = summary.pending,
                failed_lookups = summary.failed_lookups,
                "Reconciled predictions"
            );
        }
        Ok(summary)
    }

    pub fn track(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<TrackingReport> {
        self.track_at(Utc::now(), ticker, market_type, timeframe, lookback_days)
    }

    /// Reconciles, then reports the window's records and their accuracy.
    pub fn track_at(
        &self,
        now: DateTime<Utc>,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> Result<TrackingReport> {
        let reconcile = self.reconcile_at(now, ticker, market_type, timeframe, lookback_days)?;
        let cutoff = now - Duration::days(i64::from(lookback_days));
        let predictions = self
            .store
            .load_window(ticker, market_type, timeframe, cutoff)?;
        let statistics = statistics(&predictions);
        Ok(TrackingReport {
            ticker: ticker.to_string(),
            market_type,
            timeframe,
            lookback_days,
            reconcile,
            predictions,
            statistics,
        })
    }

    /// Removes all tracked predictions.
    pub fn reset(&self) -> Result<usize> {
        let removed = self.store.clear()?;
        tracing::info!(removed, "Cleared prediction store");
        Ok(removed)
    }

    fn realized_close(
        &self,
        record: &PredictionRecord,
        interval: &str,
        tolerance_ms: u64,
    ) -> Result<Option<f64>> {
        let bars = self.provider.fetch_bars(
            record.market_type,
            &record.ticker,
            interval,
            BarRange::around(record.target_time, tolerance_ms),
        )?;
        let target_ms = record.target_time.timestamp_millis();
        let tolerance = i64::try_from(tolerance_ms).unwrap_or(i64::MAX);
        Ok(bars
            .iter()
            .map(|bar| ((bar.open_time as i64 - target_ms).abs(), bar.close))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, close)| close))
    }
}
