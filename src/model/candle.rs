use serde::Serialize;

use crate::error::ForecastError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub open_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// OHLCV bars in strictly increasing `open_time` order.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(bars: Vec<Candle>) -> Result<Self, ForecastError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].open_time <= pair[0].open_time {
                return Err(ForecastError::UnorderedSeries { index: index + 1 });
            }
        }
        Ok(Self { bars })
    }

    /// Builds a series from bare closes, one bar per `step_ms` starting at `start_ms`.
    pub fn from_closes(closes: &[f64], start_ms: u64, step_ms: u64) -> Result<Self, ForecastError> {
        if step_ms == 0 {
            return Err(ForecastError::InvalidParameter(
                "bar step must be > 0".to_string(),
            ));
        }
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: start_ms + step_ms * i as u64,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();
        Self::new(bars)
    }

    pub fn bars(&self) -> &[Candle] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
