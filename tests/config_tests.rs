use stocktime::config::{parse_interval_ms, Config, TimeframePolicyTable};
use stocktime::forecast::ForecastStrategy;
use stocktime::model::{InstrumentClass, Timeframe};

const BASE_TOML: &str = r#"
[market_data]
binance_rest_base_url = "https://api.binance.com"
binance_futures_rest_base_url = "https://fapi.binance.com"
alpaca_data_base_url = "https://data.alpaca.markets"

[logging]
level = "debug"
"#;

#[test]
fn parse_minimal_toml_uses_defaults() {
    let config: Config = toml::from_str(BASE_TOML).expect("minimal config should parse");
    config.validate().expect("defaults should validate");

    assert_eq!(config.market_data.request_timeout_ms, 10_000);
    assert!(config.market_data.alpaca_api_key.is_none());
    assert_eq!(config.forecast.strategy, ForecastStrategy::RandomWalk);
    assert_eq!(config.forecast.patch_length, 32);
    assert_eq!(config.tracker.match_tolerance_ms().unwrap(), 300_000);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.timeframes, TimeframePolicyTable::default());
}

#[test]
/// The shipped calibration table: interval, period, horizon, and multipliers
/// per timeframe.
fn default_policy_table_matches_calibration() {
    let table = TimeframePolicyTable::default();
    let expected = [
        (Timeframe::FiveMin, "5m", "1d", 24, 0.2, 0.1, 300_000),
        (Timeframe::FifteenMin, "15m", "2d", 16, 0.3, 0.2, 900_000),
        (Timeframe::OneHour, "1h", "7d", 12, 0.5, 0.4, 3_600_000),
        (Timeframe::OneDay, "1d", "30d", 7, 1.0, 1.0, 86_400_000),
    ];
    for (tf, interval, period, horizon, vol, drift, target_ms) in expected {
        let policy = table.get(tf);
        assert_eq!(policy.bar_interval, interval);
        assert_eq!(policy.fetch_period, period);
        assert_eq!(policy.horizon, horizon);
        assert!((policy.volatility_multiplier - vol).abs() < f64::EPSILON);
        assert!((policy.drift_multiplier - drift).abs() < f64::EPSILON);
        assert_eq!(policy.target_interval_ms().unwrap(), target_ms);
    }
}

#[test]
fn volatility_damping_only_applies_to_crypto() {
    let table = TimeframePolicyTable::default();
    let policy = table.get(Timeframe::FiveMin);
    assert!((policy.effective_volatility_multiplier(InstrumentClass::Crypto) - 0.2).abs() < 1e-12);
    assert!((policy.effective_volatility_multiplier(InstrumentClass::Equity) - 1.0).abs() < 1e-12);
    assert!((policy.effective_drift_multiplier() - 0.1).abs() < 1e-12);
}

#[test]
fn overrides_one_timeframe_and_tracker() {
    let toml_str = format!(
        r#"{}
[forecast]
strategy = "sequence"
seed = 7

[tracker]
db_path = "/tmp/stocktime-test.sqlite"
match_tolerance = "1d"

[timeframes."1h"]
bar_interval = "1h"
fetch_period = "3d"
horizon = 6
volatility_multiplier = 0.25
drift_multiplier = 0.5
target_interval = "1h"
"#,
        BASE_TOML
    );
    let config: Config = toml::from_str(&toml_str).expect("override config should parse");
    config.validate().expect("override config should validate");

    assert_eq!(config.forecast.strategy, ForecastStrategy::Sequence);
    assert_eq!(config.forecast.seed, Some(7));
    assert_eq!(config.forecast.hidden_size, 256);
    assert_eq!(config.tracker.match_tolerance_ms().unwrap(), 86_400_000);
    assert_eq!(config.timeframes.get(Timeframe::OneHour).horizon, 6);
    assert_eq!(config.timeframes.get(Timeframe::OneDay).horizon, 7);
}

#[test]
fn rejects_zero_horizon() {
    let toml_str = format!(
        r#"{}
[timeframes."5min"]
bar_interval = "5m"
fetch_period = "1d"
horizon = 0
volatility_multiplier = 0.2
drift_multiplier = 0.1
target_interval = "5m"
"#,
        BASE_TOML
    );
    let config: Config = toml::from_str(&toml_str).expect("toml should parse");
    assert!(config.validate().is_err());
}

#[test]
fn rejects_bad_tolerance() {
    let toml_str = format!("{}\n[tracker]\nmatch_tolerance = \"soon\"\n", BASE_TOML);
    let config: Config = toml::from_str(&toml_str).expect("toml should parse");
    assert!(config.validate().is_err());
}

#[test]
fn rejects_bad_timeframe_tolerance() {
    let toml_str = format!(
        r#"{}
[timeframes."1d"]
bar_interval = "1d"
fetch_period = "30d"
horizon = 7
volatility_multiplier = 1.0
drift_multiplier = 1.0
target_interval = "1d"
match_tolerance = "half a day"
"#,
        BASE_TOML
    );
    let config: Config = toml::from_str(&toml_str).expect("toml should parse");
    assert!(config.validate().is_err());
}

#[test]
fn parse_interval_units() {
    assert_eq!(parse_interval_ms("30s").unwrap(), 30_000);
    assert_eq!(parse_interval_ms("15m").unwrap(), 900_000);
    assert_eq!(parse_interval_ms("1w").unwrap(), 604_800_000);
    assert!(parse_interval_ms("0m").is_err());
    assert!(parse_interval_ms("5x").is_err());
}

#[test]
fn shipped_config_file_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::from_path(&path).expect("config/default.toml should load");
    let mut expected = TimeframePolicyTable::default();
    expected.one_hour.match_tolerance = Some("30m".to_string());
    expected.one_day.match_tolerance = Some("12h".to_string());
    assert_eq!(config.timeframes, expected);
    assert_eq!(config.tracker.match_tolerance_ms().unwrap(), 300_000);
}

#[test]
fn timeframe_match_tolerance_falls_back_to_tracker_default() {
    let table = TimeframePolicyTable::default();
    assert_eq!(table.get(Timeframe::FiveMin).match_tolerance_ms(300_000).unwrap(), 300_000);

    let mut hourly = table.get(Timeframe::OneHour).clone();
    hourly.match_tolerance = Some("30m".to_string());
    assert_eq!(hourly.match_tolerance_ms(300_000).unwrap(), 1_800_000);

    hourly.match_tolerance = Some("soon".to_string());
    assert!(hourly.match_tolerance_ms(300_000).is_err());
}
