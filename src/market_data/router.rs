use std::time::Duration;

use anyhow::Result;

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;
use crate::model::{Candle, InstrumentClass};

use super::{AlpacaBarsClient, BarRange, BinanceKlineClient, MarketDataProvider};

/// Dispatches bar requests to the venue serving each market type.
#[derive(Debug, Clone)]
pub struct MarketDataRouter {
    spot: BinanceKlineClient,
    futures: BinanceKlineClient,
    equity: Option<AlpacaBarsClient>,
}

impl MarketDataRouter {
    pub fn from_config(cfg: &MarketDataConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.request_timeout_ms);
        let equity = match (&cfg.alpaca_api_key, &cfg.alpaca_api_secret) {
            (Some(key), Some(secret)) => Some(AlpacaBarsClient::new(
                &cfg.alpaca_data_base_url,
                key,
                secret,
                timeout,
            )?),
            _ => {
                tracing::warn!("ALPACA_API_KEY/ALPACA_API_SECRET not set; stock data disabled");
                None
            }
        };
        Ok(Self {
            spot: BinanceKlineClient::spot(&cfg.binance_rest_base_url, timeout)?,
            futures: BinanceKlineClient::futures(&cfg.binance_futures_rest_base_url, timeout)?,
            equity,
        })
    }
}

impl MarketDataProvider for MarketDataRouter {
    fn fetch_bars(
        &self,
        instrument: InstrumentClass,
        symbol: &str,
        interval: &str,
        range: BarRange,
    ) -> Result<Vec<Candle>> {
        match instrument {
            InstrumentClass::Crypto => self.spot.fetch_bars(instrument, symbol, interval, range),
            InstrumentClass::Futures => {
                self.futures.fetch_bars(instrument, symbol, interval, range)
            }
            InstrumentClass::Equity => match &self.equity {
                Some(client) => client.fetch_bars(instrument, symbol, interval, range),
                None => Err(MarketDataError::Unavailable(
                    "stock bars need ALPACA_API_KEY and ALPACA_API_SECRET".to_string(),
                )
                .into()),
            },
        }
    }
}
