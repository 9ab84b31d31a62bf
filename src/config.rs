use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::forecast::ForecastStrategy;
use crate::model::{InstrumentClass, Timeframe};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeframes: TimeframePolicyTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    pub binance_rest_base_url: String,
    pub binance_futures_rest_base_url: String,
    pub alpaca_data_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(skip)]
    pub alpaca_api_key: Option<String>,
    #[serde(skip)]
    pub alpaca_api_secret: Option<String>,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub strategy: ForecastStrategy,
    pub patch_length: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub projection_size: usize,
    pub weights_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            strategy: ForecastStrategy::RandomWalk,
            patch_length: 32,
            hidden_size: 256,
            num_layers: 2,
            projection_size: 128,
            weights_path: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    /// Max distance between a target time and the realized bar used to score it.
    pub match_tolerance: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/predictions.sqlite"),
            match_tolerance: "5m".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn match_tolerance_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.match_tolerance)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Per-timeframe calibration: how bars are fetched, how far ahead to forecast,
/// and how the random walk is damped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeframePolicy {
    pub bar_interval: String,
    pub fetch_period: String,
    pub horizon: usize,
    pub volatility_multiplier: f64,
    pub drift_multiplier: f64,
    pub target_interval: String,
    /// Overrides `[tracker].match_tolerance` for this timeframe.
    #[serde(default)]
    pub match_tolerance: Option<String>,
}

impl TimeframePolicy {
    fn new(
        bar_interval: &str,
        fetch_period: &str,
        horizon: usize,
        volatility_multiplier: f64,
        drift_multiplier: f64,
        target_interval: &str,
    ) -> Self {
        Self {
            bar_interval: bar_interval.to_string(),
            fetch_period: fetch_period.to_string(),
            horizon,
            volatility_multiplier,
            drift_multiplier,
            target_interval: target_interval.to_string(),
            match_tolerance: None,
        }
    }

    pub fn bar_interval_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.bar_interval)
    }

    pub fn fetch_period_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.fetch_period)
    }

    pub fn target_interval_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.target_interval)
    }

    /// Reconciliation tolerance for this timeframe, or `fallback_ms` when
    /// the table does not set one.
    pub fn match_tolerance_ms(&self, fallback_ms: u64) -> Result<u64> {
        match &self.match_tolerance {
            Some(tolerance) => parse_interval_ms(tolerance),
            None => Ok(fallback_ms),
        }
    }

    /// Volatility damping only applies to crypto; other markets use raw stdev.
    pub fn effective_volatility_multiplier(&self, instrument: InstrumentClass) -> f64 {
        if instrument.is_crypto() {
            self.volatility_multiplier
        } else {
            1.0
        }
    }

    pub fn effective_drift_multiplier(&self) -> f64 {
        self.drift_multiplier
    }

    fn validate(&self, id: &str) -> Result<()> {
        self.bar_interval_ms()
            .with_context(|| format!("timeframes.{}.bar_interval is invalid", id))?;
        self.fetch_period_ms()
            .with_context(|| format!("timeframes.{}.fetch_period is invalid", id))?;
        self.target_interval_ms()
            .with_context(|| format!("timeframes.{}.target_interval is invalid", id))?;
        self.match_tolerance_ms(0)
            .with_context(|| format!("timeframes.{}.match_tolerance is invalid", id))?;
        if self.horizon == 0 {
            bail!("timeframes.{}.horizon must be > 0", id);
        }
        if !(self.volatility_multiplier >= 0.0) || !(self.drift_multiplier >= 0.0) {
            bail!("timeframes.{}: multipliers must be finite and >= 0", id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimeframePolicyTable {
    #[serde(rename = "5min")]
    pub five_min: TimeframePolicy,
    #[serde(rename = "15min")]
    pub fifteen_min: TimeframePolicy,
    #[serde(rename = "1h")]
    pub one_hour: TimeframePolicy,
    #[serde(rename = "1d")]
    pub one_day: TimeframePolicy,
}

impl Default for TimeframePolicyTable {
    fn default() -> Self {
        Self {
            five_min: TimeframePolicy::new("5m", "1d", 24, 0.2, 0.1, "5m"),
            fifteen_min: TimeframePolicy::new("15m", "2d", 16, 0.3, 0.2, "15m"),
            one_hour: TimeframePolicy::new("1h", "7d", 12, 0.5, 0.4, "1h"),
            one_day: TimeframePolicy::new("1d", "30d", 7, 1.0, 1.0, "1d"),
        }
    }
}

impl TimeframePolicyTable {
    pub fn get(&self, timeframe: Timeframe) -> &TimeframePolicy {
        match timeframe {
            Timeframe::FiveMin => &self.five_min,
            Timeframe::FifteenMin => &self.fifteen_min,
            Timeframe::OneHour => &self.one_hour,
            Timeframe::OneDay => &self.one_day,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for tf in Timeframe::ALL {
            self.get(tf).validate(tf.as_str())?;
        }
        Ok(())
    }
}

/// Parse an interval string (e.g. "5m", "1h", "1d", "30d") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '5m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("STOCKTIME_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;

        config.market_data.alpaca_api_key = non_empty_env("ALPACA_API_KEY");
        config.market_data.alpaca_api_secret = non_empty_env("ALPACA_API_SECRET");

        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast.patch_length == 0 {
            bail!("forecast.patch_length must be > 0");
        }
        if self.forecast.hidden_size == 0 || self.forecast.num_layers == 0 {
            bail!("forecast.hidden_size and forecast.num_layers must be > 0");
        }
        if self.market_data.request_timeout_ms == 0 {
            bail!("market_data.request_timeout_ms must be > 0");
        }
        self.tracker
            .match_tolerance_ms()
            .context("tracker.match_tolerance is invalid")?;
        self.timeframes.validate()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("5m").unwrap(), 300_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("30d").unwrap(), 2_592_000_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
    }

    #[test]
    fn default_policy_table_is_valid() {
        TimeframePolicyTable::default()
            .validate()
            .expect("built-in table should validate");
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let mut table = TimeframePolicyTable::default();
        table.one_hour.horizon = 0;
        assert!(table.validate().is_err());
    }
}
