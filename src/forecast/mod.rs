pub mod batch;
pub mod lstm;
pub mod normalize;
pub mod patch;
pub mod sequence;
pub mod stochastic;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::model::{InstrumentClass, PriceSeries, Timeframe};

pub use batch::{ForecastBatch, ForecastPoint};
pub use lstm::{LstmConfig, LstmCore, LstmWeights};
pub use normalize::{denormalize, normalize, Denormalization, NormalizationStats};
pub use patch::{make_patches, PatchSummary, PricePatch, DEFAULT_PATCH_LENGTH};
pub use sequence::{RecurrentCore, SequenceForecaster, SlidingWindow};
pub use stochastic::{random_walk, return_stats, ReturnStats, StochasticForecaster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastContext {
    pub instrument: InstrumentClass,
    pub timeframe: Timeframe,
}

/// A multi-step price forecaster. Implementations return raw prices, one per
/// step, `horizon` in total.
pub trait Forecaster {
    fn name(&self) -> &'static str;

    fn rollout(
        &self,
        history: &PriceSeries,
        horizon: usize,
        ctx: ForecastContext,
    ) -> Result<Vec<f64>, ForecastError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastStrategy {
    Sequence,
    RandomWalk,
}

impl ForecastStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::RandomWalk => "random-walk",
        }
    }
}

impl fmt::Display for ForecastStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastStrategy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "lstm" => Ok(Self::Sequence),
            "random-walk" | "random_walk" | "stochastic" => Ok(Self::RandomWalk),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown forecast strategy '{}': expected sequence or random-walk",
                other
            ))),
        }
    }
}
