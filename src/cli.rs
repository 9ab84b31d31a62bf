use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::forecast::ForecastStrategy;
use crate::market_data::MarketDataRouter;
use crate::model::{default_lookback_days, InstrumentClass, Timeframe};
use crate::service::ForecastService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Forecast {
        ticker: String,
        market: InstrumentClass,
        timeframe: Timeframe,
        /// Falls back to `forecast.strategy` from config.
        strategy: Option<ForecastStrategy>,
    },
    Track {
        ticker: String,
        market: InstrumentClass,
        timeframe: Timeframe,
        days: Option<u32>,
    },
    Reset,
    Help,
}

pub fn parse_command(args: &[String]) -> Result<Command> {
    let Some(sub) = args.first() else {
        return Ok(Command::Help);
    };
    match sub.as_str() {
        "forecast" | "predict" => {
            let (ticker, opts) = parse_ticker_and_options(&args[1..], sub)?;
            let mut strategy = None;
            for (flag, value) in &opts.extra {
                match flag.as_str() {
                    "--strategy" => strategy = Some(value.parse::<ForecastStrategy>()?),
                    other => bail!("unknown option `{}` for `forecast`", other),
                }
            }
            Ok(Command::Forecast {
                ticker,
                market: opts.market,
                timeframe: opts.timeframe,
                strategy,
            })
        }
        "track" => {
            let (ticker, opts) = parse_ticker_and_options(&args[1..], sub)?;
            let mut days = None;
            for (flag, value) in &opts.extra {
                match flag.as_str() {
                    "--days" => {
                        let n: u32 = value
                            .parse()
                            .with_context(|| format!("invalid --days value `{}`", value))?;
                        if n == 0 {
                            bail!("--days must be > 0");
                        }
                        days = Some(n);
                    }
                    other => bail!("unknown option `{}` for `track`", other),
                }
            }
            Ok(Command::Track {
                ticker,
                market: opts.market,
                timeframe: opts.timeframe,
                days,
            })
        }
        "reset" => Ok(Command::Reset),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!(
            "unknown subcommand `{}`. expected one of: forecast|track|reset|help",
            other
        ),
    }
}

struct CommonOptions {
    market: InstrumentClass,
    timeframe: Timeframe,
    extra: Vec<(String, String)>,
}

fn parse_ticker_and_options(args: &[String], sub: &str) -> Result<(String, CommonOptions)> {
    let ticker = args
        .first()
        .filter(|t| !t.starts_with("--"))
        .ok_or_else(|| anyhow!("`{}` requires a ticker argument", sub))?
        .trim()
        .to_string();
    if ticker.is_empty() {
        bail!("ticker must not be empty");
    }

    let mut opts = CommonOptions {
        market: InstrumentClass::Equity,
        timeframe: Timeframe::OneDay,
        extra: Vec::new(),
    };
    let mut rest = args[1..].iter();
    while let Some(flag) = rest.next() {
        let value = rest
            .next()
            .ok_or_else(|| anyhow!("option `{}` requires a value", flag))?;
        match flag.as_str() {
            "--market" => opts.market = value.parse()?,
            "--timeframe" => opts.timeframe = value.parse()?,
            _ => opts.extra.push((flag.clone(), value.clone())),
        }
    }
    Ok((ticker, opts))
}

pub fn run_cli(args: &[String]) -> Result<()> {
    let command = parse_command(args)?;
    if command == Command::Help {
        print_usage();
        return Ok(());
    }

    let config = Config::load()?;
    init_tracing(&config);
    let router = Arc::new(MarketDataRouter::from_config(&config.market_data)?);
    let service = ForecastService::from_config(&config, router)?;

    match command {
        Command::Forecast {
            ticker,
            market,
            timeframe,
            strategy,
        } => {
            let strategy = strategy.unwrap_or(config.forecast.strategy);
            let outcome = service.forecast(&ticker, market, timeframe, strategy)?;
            print_json(&outcome)
        }
        Command::Track {
            ticker,
            market,
            timeframe,
            days,
        } => {
            let days = days.unwrap_or_else(|| default_lookback_days(market, timeframe));
            let report = service.tracker().track(&ticker, market, timeframe, days)?;
            print_json(&report)
        }
        Command::Reset => {
            let removed = service.tracker().reset()?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Command::Help => Ok(()),
    }
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

pub fn print_usage() {
    println!("stocktime - price forecasting with accuracy tracking");
    println!();
    println!("USAGE:");
    println!("  stocktime forecast <TICKER> [--market stock|futures|crypto] [--timeframe 5min|15min|1h|1d] [--strategy sequence|random-walk]");
    println!("  stocktime track <TICKER> [--market M] [--timeframe T] [--days N]");
    println!("  stocktime reset");
    println!("  stocktime help");
    println!();
    println!("Config is read from config/default.toml (override with STOCKTIME_CONFIG).");
    println!("Stock data needs ALPACA_API_KEY and ALPACA_API_SECRET.");
}
