use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

use crate::error::MarketDataError;
use crate::model::{Candle, InstrumentClass};

use super::{compact_error_body, BarRange, MarketDataProvider};

/// Alpaca market-data client for US equity bars.
#[derive(Debug, Clone)]
pub struct AlpacaBarsClient {
    http: reqwest::blocking::Client,
    data_base_url: String,
}

impl AlpacaBarsClient {
    pub fn new(
        data_base_url: &str,
        api_key: &str,
        api_secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(api_key)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(api_secret)?);
        let http = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build Alpaca HTTP client")?;
        Ok(Self {
            http,
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn get_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let request_symbol = symbol.trim().to_ascii_uppercase();
        let endpoint = format!("{}/v2/stocks/bars", self.data_base_url);
        let start_s = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_s = end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("symbols", request_symbol.as_str()),
                ("timeframe", alpaca_timeframe(interval)),
                ("start", start_s.as_str()),
                ("end", end_s.as_str()),
                ("limit", "10000"),
                ("sort", "asc"),
                // Free-tier accounts only have the IEX feed.
                ("feed", "iex"),
            ])
            .send()
            .map_err(MarketDataError::from)
            .context("alpaca get_bars HTTP failed")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            tracing::warn!(
                status,
                symbol = %request_symbol,
                detail = %compact_error_body(&body),
                "alpaca bars returned non-success"
            );
            return Err(MarketDataError::Status {
                provider: "alpaca",
                status,
                detail: compact_error_body(&body),
            }
            .into());
        }

        let root: Value = response
            .json()
            .map_err(MarketDataError::from)
            .context("alpaca get_bars JSON parse failed")?;
        Ok(parse_bars(&root, &request_symbol)?)
    }
}

impl MarketDataProvider for AlpacaBarsClient {
    fn fetch_bars(
        &self,
        _instrument: InstrumentClass,
        symbol: &str,
        interval: &str,
        range: BarRange,
    ) -> Result<Vec<Candle>> {
        let (start, end) = range.resolve(Utc::now());
        self.get_bars(symbol, interval, start, end)
    }
}

fn alpaca_timeframe(interval: &str) -> &'static str {
    match interval {
        "1m" => "1Min",
        "5m" => "5Min",
        "15m" => "15Min",
        "1h" => "1Hour",
        "1d" => "1Day",
        _ => "1Day",
    }
}

fn parse_bars(root: &Value, symbol: &str) -> Result<Vec<Candle>, MarketDataError> {
    let bars = root
        .get("bars")
        .and_then(|b| b.get(symbol))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut candles = Vec::with_capacity(bars.len());
    for bar in bars {
        let ts = bar.get("t").and_then(Value::as_str).unwrap_or_default();
        let open_time = DateTime::parse_from_rfc3339(ts)
            .map_err(|e| MarketDataError::Payload(format!("invalid bar timestamp '{}': {}", ts, e)))?
            .timestamp_millis()
            .max(0) as u64;
        let close = bar
            .get("c")
            .and_then(Value::as_f64)
            .ok_or_else(|| MarketDataError::Payload(format!("bar at {} has no close", ts)))?;
        candles.push(Candle {
            open_time,
            open: bar.get("o").and_then(Value::as_f64).unwrap_or(close),
            high: bar.get("h").and_then(Value::as_f64).unwrap_or(close),
            low: bar.get("l").and_then(Value::as_f64).unwrap_or(close),
            close,
            volume: bar.get("v").and_then(Value::as_f64).unwrap_or(0.0),
        });
    }
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    Ok(candles)
}
