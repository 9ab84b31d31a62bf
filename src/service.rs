use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, TimeframePolicyTable};
use crate::error::ForecastError;
use crate::forecast::{
    ForecastBatch, ForecastContext, ForecastStrategy, Forecaster, LstmConfig, LstmCore,
    LstmWeights, RecurrentCore, SequenceForecaster, StochasticForecaster,
};
use crate::market_data::{BarRange, MarketDataProvider};
use crate::model::{InstrumentClass, PriceSeries, Timeframe};
use crate::tracker::{PredictionStore, PredictionTracker};

const DEFAULT_LSTM_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutcome {
    pub ticker: String,
    pub market_type: InstrumentClass,
    pub timeframe: Timeframe,
    pub strategy: ForecastStrategy,
    pub historical_prices: Vec<f64>,
    pub predictions: ForecastBatch,
    pub record_ids: Vec<i64>,
}

/// Fetch, forecast, persist. One instance serves every ticker.
pub struct ForecastService<P: MarketDataProvider, C: RecurrentCore = LstmCore> {
    provider: Arc<P>,
    policies: Arc<TimeframePolicyTable>,
    sequence: SequenceForecaster<C>,
    stochastic: StochasticForecaster,
    tracker: PredictionTracker<Arc<P>>,
}

impl<P: MarketDataProvider> ForecastService<P, LstmCore> {
    pub fn from_config(cfg: &Config, provider: Arc<P>) -> Result<Self> {
        let policies = Arc::new(cfg.timeframes.clone());
        let core = match &cfg.forecast.weights_path {
            Some(path) => LstmCore::new(LstmWeights::from_json_file(path)?)?,
            None => {
                let seed = cfg.forecast.seed.unwrap_or(DEFAULT_LSTM_SEED);
                tracing::warn!(
                    seed,
                    "No LSTM weights configured; sequence forecasts use untrained weights"
                );
                LstmCore::seeded(
                    LstmConfig {
                        hidden_size: cfg.forecast.hidden_size,
                        num_layers: cfg.forecast.num_layers,
                        projection_size: cfg.forecast.projection_size,
                    },
                    seed,
                )
            }
        };
        let sequence = SequenceForecaster::new(core, cfg.forecast.patch_length)?;
        let stochastic = StochasticForecaster::new(policies.clone(), cfg.forecast.seed);
        let store = PredictionStore::open(&cfg.tracker.db_path)?;
        let tracker = PredictionTracker::new(
            store,
            provider.clone(),
            policies.clone(),
            cfg.tracker.match_tolerance_ms()?,
        );
        Ok(Self::new(provider, policies, sequence, stochastic, tracker))
    }
}

impl<P: MarketDataProvider, C: RecurrentCore> ForecastService<P, C> {
    pub fn new(
        provider: Arc<P>,
        policies: Arc<TimeframePolicyTable>,
        sequence: SequenceForecaster<C>,
        stochastic: StochasticForecaster,
        tracker: PredictionTracker<Arc<P>>,
    ) -> Self {
        Self {
            provider,
            policies,
            sequence,
            stochastic,
            tracker,
        }
    }

    pub fn tracker(&self) -> &PredictionTracker<Arc<P>> {
        &self.tracker
    }

    pub fn forecast(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        strategy: ForecastStrategy,
    ) -> Result<ForecastOutcome> {
        self.forecast_at(Utc::now(), ticker, market_type, timeframe, strategy)
    }

    pub fn forecast_at(
        &self,
        now: DateTime<Utc>,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        strategy: ForecastStrategy,
    ) -> Result<ForecastOutcome> {
        let policy = self.policies.get(timeframe);
        let bars = self
            .provider
            .fetch_bars(
                market_type,
                ticker,
                &policy.bar_interval,
                BarRange::Trailing {
                    period_ms: policy.fetch_period_ms()?,
                },
            )
            .with_context(|| format!("failed to fetch {} bars for {}", policy.bar_interval, ticker))?;
        if bars.is_empty() {
            return Err(ForecastError::NoMarketData {
                symbol: ticker.to_string(),
                interval: policy.bar_interval.clone(),
            }
            .into());
        }
        let history = PriceSeries::new(bars)?;

        let forecaster: &dyn Forecaster = match strategy {
            ForecastStrategy::Sequence => &self.sequence,
            ForecastStrategy::RandomWalk => &self.stochastic,
        };
        let ctx = ForecastContext {
            instrument: market_type,
            timeframe,
        };
        let prices = forecaster.rollout(&history, policy.horizon, ctx)?;
        let batch = ForecastBatch::schedule(&prices, timeframe, now, policy.target_interval_ms()?);
        let record_ids = self.tracker.store(ticker, market_type, &batch)?;

        tracing::info!(
            ticker,
            market_type = %market_type,
            timeframe = %timeframe,
            strategy = forecaster.name(),
            bars = history.len(),
            horizon = batch.len(),
            "Forecast issued"
        );

        Ok(ForecastOutcome {
            ticker: ticker.to_string(),
            market_type,
            timeframe,
            strategy,
            historical_prices: history.closes(),
            predictions: batch,
            record_ids,
        })
    }
}
