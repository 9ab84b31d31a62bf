pub mod alpaca;
pub mod binance;
pub mod router;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::model::{Candle, InstrumentClass};

pub use alpaca::AlpacaBarsClient;
pub use binance::BinanceKlineClient;
pub use router::MarketDataRouter;

/// Time window of bars to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarRange {
    /// The most recent `period_ms` ending now.
    Trailing { period_ms: u64 },
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl BarRange {
    pub fn around(center: DateTime<Utc>, tolerance_ms: u64) -> Self {
        let tol = Duration::milliseconds(tolerance_ms as i64);
        Self::Between {
            start: center - tol,
            end: center + tol,
        }
    }

    pub fn resolve(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::Trailing { period_ms } => (now - Duration::milliseconds(period_ms as i64), now),
            Self::Between { start, end } => (start, end),
        }
    }
}

/// Source of OHLCV bars. Bars come back oldest first; an empty vector means
/// the venue had nothing for the window and is not an error.
pub trait MarketDataProvider {
    fn fetch_bars(
        &self,
        instrument: InstrumentClass,
        symbol: &str,
        interval: &str,
        range: BarRange,
    ) -> Result<Vec<Candle>>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Arc<P> {
    fn fetch_bars(
        &self,
        instrument: InstrumentClass,
        symbol: &str,
        interval: &str,
        range: BarRange,
    ) -> Result<Vec<Candle>> {
        (**self).fetch_bars(instrument, symbol, interval, range)
    }
}

fn compact_error_body(body: &str) -> String {
    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.len() > 180 {
        let cut = (0..=180)
            .rev()
            .find(|&i| normalized.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}...", &normalized[..cut])
    } else {
        normalized
    }
}
