use crate::error::ForecastError;
use crate::forecast::lstm::LstmCore;
use crate::forecast::normalize::{denormalize, normalize, Denormalization};
use crate::forecast::{ForecastContext, Forecaster};
use crate::model::PriceSeries;

/// One-step predictor over a window of normalized values.
pub trait RecurrentCore {
    fn next_value(&self, window: &[f64]) -> f64;
}

/// Fixed-size rollout window. New values overwrite the oldest slot in place.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    buffer: Vec<f64>,
    head: usize,
    generated: usize,
}

impl SlidingWindow {
    pub fn new(initial: &[f64]) -> Self {
        Self {
            buffer: initial.to_vec(),
            head: 0,
            generated: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % self.buffer.len();
        self.generated += 1;
    }

    /// Copies the window oldest-first into `out`.
    pub fn copy_ordered(&self, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.buffer[self.head..]);
        out.extend_from_slice(&self.buffer[..self.head]);
    }

    /// Number of slots currently holding forecaster output.
    pub fn generated_in_window(&self) -> usize {
        self.generated.min(self.buffer.len())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Autoregressive forecaster: predicts one step, feeds it back, repeats.
#[derive(Debug, Clone)]
pub struct SequenceForecaster<C: RecurrentCore = LstmCore> {
    core: C,
    patch_length: usize,
}

impl<C: RecurrentCore> SequenceForecaster<C> {
    pub fn new(core: C, patch_length: usize) -> Result<Self, ForecastError> {
        if patch_length == 0 {
            return Err(ForecastError::InvalidParameter(
                "patch length must be > 0".to_string(),
            ));
        }
        Ok(Self { core, patch_length })
    }

    pub fn patch_length(&self) -> usize {
        self.patch_length
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Rolls the model forward `horizon` steps from the last `patch_length`
    /// values of `normalized`. Output stays in normalized space.
    pub fn rollout_normalized(
        &self,
        normalized: &[f64],
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        if normalized.len() < self.patch_length {
            return Err(ForecastError::InsufficientData {
                required: self.patch_length,
                available: normalized.len(),
            });
        }
        let mut window = SlidingWindow::new(&normalized[normalized.len() - self.patch_length..]);
        let mut input = Vec::with_capacity(self.patch_length);
        let mut predictions = Vec::with_capacity(horizon);
        for step in 0..horizon {
            window.copy_ordered(&mut input);
            let next = self.core.next_value(&input);
            if !next.is_finite() {
                return Err(ForecastError::DegenerateInput(format!(
                    "recurrent core produced a non-finite value at step {}",
                    step
                )));
            }
            predictions.push(next);
            window.push(next);
        }
        Ok(predictions)
    }

    /// Normalizes `recent_prices` with fresh statistics, rolls out, and maps
    /// the predictions back to price space with the same statistics.
    pub fn forecast_prices(
        &self,
        recent_prices: &[f64],
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        if recent_prices.len() < self.patch_length {
            return Err(ForecastError::InsufficientData {
                required: self.patch_length,
                available: recent_prices.len(),
            });
        }
        let (normalized, stats) = normalize(recent_prices)?;
        let predictions = self.rollout_normalized(&normalized, horizon)?;
        denormalize(&predictions, Denormalization::Stats(stats))
    }

    /// Rollout over an already-normalized series whose statistics were not
    /// kept. Prices are rescaled around `last_price` (lossy).
    pub fn forecast_anchored(
        &self,
        normalized: &[f64],
        last_price: f64,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let predictions = self.rollout_normalized(normalized, horizon)?;
        denormalize(&predictions, Denormalization::Anchor(last_price))
    }
}

impl<C: RecurrentCore> Forecaster for SequenceForecaster<C> {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn rollout(
        &self,
        history: &PriceSeries,
        horizon: usize,
        _ctx: ForecastContext,
    ) -> Result<Vec<f64>, ForecastError> {
        self.forecast_prices(&history.closes(), horizon)
    }
}
