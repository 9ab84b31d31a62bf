use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::MarketDataError;
use crate::model::{Candle, InstrumentClass};

use super::{compact_error_body, BarRange, MarketDataProvider};

const MAX_KLINES_PER_REQUEST: usize = 1000;

#[derive(Debug, Deserialize)]
struct BinanceApiErrorResponse {
    code: i64,
    msg: String,
}

/// Public kline endpoint of a Binance market (spot or USD-M futures).
#[derive(Debug, Clone)]
pub struct BinanceKlineClient {
    http: reqwest::blocking::Client,
    base_url: String,
    klines_path: &'static str,
}

impl BinanceKlineClient {
    pub fn spot(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, "/api/v3/klines", timeout)
    }

    pub fn futures(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, "/fapi/v1/klines", timeout)
    }

    fn build(base_url: &str, klines_path: &'static str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Binance HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            klines_path,
        })
    }

    pub fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}{}", self.base_url, self.klines_path);
        let start = start_ms.max(0).to_string();
        let end = end_ms.max(0).to_string();
        let limit = MAX_KLINES_PER_REQUEST.to_string();

        tracing::debug!(symbol, interval, start_ms, end_ms, "Requesting Binance klines");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .map_err(MarketDataError::from)
            .context("binance get_klines HTTP failed")?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                return Err(MarketDataError::BinanceApi {
                    code: err.code,
                    msg: err.msg,
                }
                .into());
            }
            return Err(MarketDataError::Status {
                provider: "binance",
                status,
                detail: compact_error_body(&body),
            }
            .into());
        }

        let root: Value = resp
            .json()
            .map_err(MarketDataError::from)
            .context("binance get_klines JSON parse failed")?;
        Ok(parse_kline_rows(&root)?)
    }
}

impl MarketDataProvider for BinanceKlineClient {
    fn fetch_bars(
        &self,
        _instrument: InstrumentClass,
        symbol: &str,
        interval: &str,
        range: BarRange,
    ) -> Result<Vec<Candle>> {
        let (start, end) = range.resolve(Utc::now());
        self.get_klines(
            &binance_symbol(symbol),
            interval,
            start.timestamp_millis(),
            end.timestamp_millis(),
        )
    }
}

/// Maps tickers like `btc-usd` or `ETH/USDT` onto Binance pair names.
pub fn binance_symbol(ticker: &str) -> String {
    let compact: String = ticker
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();
    if compact.ends_with("USD") {
        format!("{}T", compact)
    } else {
        compact
    }
}

fn parse_kline_rows(root: &Value) -> Result<Vec<Candle>, MarketDataError> {
    let rows = root
        .as_array()
        .ok_or_else(|| MarketDataError::Payload("expected a JSON array of klines".to_string()))?;
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let open_time = row
            .get(0)
            .and_then(Value::as_u64)
            .ok_or_else(|| MarketDataError::Payload(format!("kline without open time: {}", row)))?;
        candles.push(Candle {
            open_time,
            open: number_field(row, 1)?,
            high: number_field(row, 2)?,
            low: number_field(row, 3)?,
            close: number_field(row, 4)?,
            volume: number_field(row, 5)?,
        });
    }
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    Ok(candles)
}

// Binance sends prices as strings; accept plain numbers too.
fn number_field(row: &Value, idx: usize) -> Result<f64, MarketDataError> {
    let v = row.get(idx);
    v.and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| v.and_then(Value::as_f64))
        .ok_or_else(|| MarketDataError::Payload(format!("kline field {} is not numeric", idx)))
}
