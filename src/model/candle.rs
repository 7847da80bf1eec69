use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One OHLCV bar. `timestamp` is the bar start in epoch milliseconds.
///
/// Serialized with the field names the dashboard API has always exposed
/// (`opening_price`, `trade_price`, ...), so cached rows and HTTP responses
/// share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    #[serde(rename = "opening_price")]
    pub open: f64,
    #[serde(rename = "high_price")]
    pub high: f64,
    #[serde(rename = "low_price")]
    pub low: f64,
    #[serde(rename = "trade_price")]
    pub close: f64,
    #[serde(rename = "candle_acc_trade_volume")]
    pub volume: f64,
    #[serde(
        rename = "candle_acc_trade_price",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub quote_volume: Option<f64>,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            quote_volume: None,
        }
    }

    pub fn with_quote_volume(mut self, quote_volume: f64) -> Self {
        self.quote_volume = Some(quote_volume);
        self
    }

    /// Check the OHLC envelope and volume signs.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| AppError::MalformedCandle {
            timestamp: self.timestamp,
            reason,
        };
        if !(self.low <= self.high) {
            return Err(fail(format!("low {} above high {}", self.low, self.high)));
        }
        for (name, v) in [("open", self.open), ("close", self.close)] {
            if !(self.low <= v && v <= self.high) {
                return Err(fail(format!(
                    "{} {} outside [{}, {}]",
                    name, v, self.low, self.high
                )));
            }
        }
        if !(self.volume >= 0.0) {
            return Err(fail(format!("negative volume {}", self.volume)));
        }
        if let Some(qv) = self.quote_volume {
            if !(qv >= 0.0) {
                return Err(fail(format!("negative quote volume {}", qv)));
            }
        }
        Ok(())
    }
}

/// Persistence category of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleType {
    Minute,
    Day,
    Week,
    Month,
}

impl CandleType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::fmt::Display for CandleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
