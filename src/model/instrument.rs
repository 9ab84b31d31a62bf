use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ForecastError;
use crate::model::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    #[serde(rename = "stock")]
    Equity,
    Futures,
    Crypto,
}

impl InstrumentClass {
    /// Label persisted in the `market_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "stock",
            Self::Futures => "futures",
            Self::Crypto => "crypto",
        }
    }

    pub fn is_crypto(self) -> bool {
        matches!(self, Self::Crypto)
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentClass {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" | "equity" => Ok(Self::Equity),
            "futures" | "future" => Ok(Self::Futures),
            "crypto" => Ok(Self::Crypto),
            _ => Err(ForecastError::UnknownInstrument(s.to_string())),
        }
    }
}

/// Tracking lookback used when the caller does not pass one.
/// Intraday crypto turns over fast enough that one day of records is plenty.
pub fn default_lookback_days(instrument: InstrumentClass, timeframe: Timeframe) -> u32 {
    if instrument.is_crypto() && timeframe.is_intraday() {
        1
    } else {
        7
    }
}
