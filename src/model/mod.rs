pub mod candle;
pub mod instrument;
pub mod timeframe;

pub use candle::{Candle, PriceSeries};
pub use instrument::{default_lookback_days, InstrumentClass};
pub use timeframe::Timeframe;
