use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::TimeframePolicyTable;
use crate::error::ForecastError;
use crate::forecast::{ForecastContext, Forecaster};
use crate::model::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnStats {
    pub drift: f64,
    pub volatility: f64,
    pub samples: usize,
}

/// Simple returns of consecutive closes. The first bar has no return.
pub fn simple_returns(closes: &[f64]) -> Result<Vec<f64>, ForecastError> {
    if closes.len() < 2 {
        return Err(ForecastError::InsufficientHistory {
            required: 2,
            available: closes.len(),
        });
    }
    closes
        .windows(2)
        .map(|pair| {
            if !(pair[0] > 0.0) || !pair[1].is_finite() {
                return Err(ForecastError::DegenerateInput(format!(
                    "cannot compute a return from {} to {}",
                    pair[0], pair[1]
                )));
            }
            Ok(pair[1] / pair[0] - 1.0)
        })
        .collect()
}

/// Unscaled mean and population stdev of simple returns.
pub fn return_stats(closes: &[f64]) -> Result<ReturnStats, ForecastError> {
    let returns = simple_returns(closes)?;
    let n = returns.len() as f64;
    let drift = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - drift) * (r - drift)).sum::<f64>() / n;
    Ok(ReturnStats {
        drift,
        volatility: var.sqrt(),
        samples: returns.len(),
    })
}

/// Multiplicative walk: `p[i] = p[i-1] * (1 + step)`, `step ~ N(drift, volatility)`.
pub fn random_walk<R: Rng + ?Sized>(
    last_close: f64,
    drift: f64,
    volatility: f64,
    horizon: usize,
    rng: &mut R,
) -> Result<Vec<f64>, ForecastError> {
    if !last_close.is_finite() || !drift.is_finite() || !volatility.is_finite() {
        return Err(ForecastError::DegenerateInput(format!(
            "random walk parameters must be finite (close={}, drift={}, volatility={})",
            last_close, drift, volatility
        )));
    }
    let normal = Normal::new(drift, volatility).map_err(|e| {
        ForecastError::InvalidParameter(format!("volatility {}: {}", volatility, e))
    })?;
    let mut price = last_close;
    let mut path = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let step = normal.sample(rng);
        price *= 1.0 + step;
        path.push(price);
    }
    Ok(path)
}

/// Model-free forecaster calibrated per timeframe by the policy table.
#[derive(Debug)]
pub struct StochasticForecaster {
    policies: Arc<TimeframePolicyTable>,
    rng: Mutex<StdRng>,
}

impl StochasticForecaster {
    pub fn new(policies: Arc<TimeframePolicyTable>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            policies,
            rng: Mutex::new(rng),
        }
    }

    /// Return statistics after the timeframe multipliers are applied.
    pub fn calibrate(
        &self,
        closes: &[f64],
        ctx: ForecastContext,
    ) -> Result<ReturnStats, ForecastError> {
        let raw = return_stats(closes)?;
        let policy = self.policies.get(ctx.timeframe);
        Ok(ReturnStats {
            drift: raw.drift * policy.effective_drift_multiplier(),
            volatility: raw.volatility * policy.effective_volatility_multiplier(ctx.instrument),
            samples: raw.samples,
        })
    }
}

impl Forecaster for StochasticForecaster {
    fn name(&self) -> &'static str {
        "random-walk"
    }

    fn rollout(
        &self,
        history: &PriceSeries,
        horizon: usize,
        ctx: ForecastContext,
    ) -> Result<Vec<f64>, ForecastError> {
        let closes = history.closes();
        let calibrated = self.calibrate(&closes, ctx)?;
        let last_close = closes[closes.len() - 1];
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        random_walk(
            last_close,
            calibrated.drift,
            calibrated.volatility,
            horizon,
            &mut *rng,
        )
    }
}
