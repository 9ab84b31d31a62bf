use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("insufficient data: need at least {required} values, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("insufficient history: need at least {required} bars, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("no market data for {symbol} at interval {interval}")]
    NoMarketData { symbol: String, interval: String },

    #[error("price series is not strictly increasing in time at bar {index}")]
    UnorderedSeries { index: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown timeframe '{0}': expected one of 5min/15min/1h/1d")]
    UnknownTimeframe(String),

    #[error("unknown market type '{0}': expected one of stock/futures/crypto")]
    UnknownInstrument(String),
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("binance API error (code {code}): {msg}")]
    BinanceApi { code: i64, msg: String },

    #[error("{provider} returned {status}: {detail}")]
    Status {
        provider: &'static str,
        status: u16,
        detail: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed bar payload: {0}")]
    Payload(String),

    #[error("market data unavailable: {0}")]
    Unavailable(String),
}
