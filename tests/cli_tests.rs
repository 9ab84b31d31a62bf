use stocktime::cli::{parse_command, Command};
use stocktime::forecast::ForecastStrategy;
use stocktime::model::{InstrumentClass, Timeframe};

fn args(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[test]
fn forecast_defaults_to_daily_stock() {
    assert_eq!(
        parse_command(&args("forecast AAPL")).unwrap(),
        Command::Forecast {
            ticker: "AAPL".to_string(),
            market: InstrumentClass::Equity,
            timeframe: Timeframe::OneDay,
            strategy: None,
        }
    );
}

#[test]
fn forecast_accepts_all_options() {
    assert_eq!(
        parse_command(&args(
            "forecast BTC-USD --market crypto --timeframe 5min --strategy sequence"
        ))
        .unwrap(),
        Command::Forecast {
            ticker: "BTC-USD".to_string(),
            market: InstrumentClass::Crypto,
            timeframe: Timeframe::FiveMin,
            strategy: Some(ForecastStrategy::Sequence),
        }
    );
}

#[test]
fn track_parses_days() {
    assert_eq!(
        parse_command(&args("track ETHUSDT --timeframe 1h --market crypto --days 3")).unwrap(),
        Command::Track {
            ticker: "ETHUSDT".to_string(),
            market: InstrumentClass::Crypto,
            timeframe: Timeframe::OneHour,
            days: Some(3),
        }
    );
}

#[test]
fn reset_and_help() {
    assert_eq!(parse_command(&args("reset")).unwrap(), Command::Reset);
    assert_eq!(parse_command(&args("--help")).unwrap(), Command::Help);
}

#[test]
fn rejects_bad_input() {
    assert!(parse_command(&args("forecast")).is_err());
    assert!(parse_command(&args("forecast --market crypto")).is_err());
    assert!(parse_command(&args("forecast AAPL --timeframe 4h")).is_err());
    assert!(parse_command(&args("forecast AAPL --days 3")).is_err());
    assert!(parse_command(&args("track AAPL --days 0")).is_err());
    assert!(parse_command(&args("track AAPL --strategy sequence")).is_err());
    assert!(parse_command(&args("launch")).is_err());
}
