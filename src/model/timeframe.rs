use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ForecastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Timeframe {
    #[serde(rename = "5min")]
    FiveMin,
    #[serde(rename = "15min")]
    FifteenMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FiveMin,
        Timeframe::FifteenMin,
        Timeframe::OneHour,
        Timeframe::OneDay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FiveMin => "5min",
            Self::FifteenMin => "15min",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }

    pub fn is_intraday(self) -> bool {
        !matches!(self, Self::OneDay)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5min" | "5m" => Ok(Self::FiveMin),
            "15min" | "15m" => Ok(Self::FifteenMin),
            "1h" | "60min" => Ok(Self::OneHour),
            "1d" | "1day" => Ok(Self::OneDay),
            _ => Err(ForecastError::UnknownTimeframe(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_str() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>(), Ok(tf));
        }
        assert_eq!("15m".parse::<Timeframe>(), Ok(Timeframe::FifteenMin));
        assert_eq!(
            "4h".parse::<Timeframe>(),
            Err(ForecastError::UnknownTimeframe("4h".to_string()))
        );
    }
}
