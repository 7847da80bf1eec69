//! Wire shapes of the exchange REST APIs and their mapping onto the
//! canonical [`Candle`] / [`Ticker`] types. Field fallbacks between API
//! revisions are resolved here and nowhere else.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::model::candle::Candle;
use crate::model::ticker::Ticker;

/// Deserialize a JSON number or a numeric string to f64.
pub fn string_or_number_to_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    value_to_f64(&v).ok_or_else(|| serde::de::Error::custom(format!("invalid numeric value {}", v)))
}

pub fn opt_string_or_number_to_f64<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Null => Ok(None),
        other => value_to_f64(&other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid numeric value {}", other))),
    }
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Candle row of the Upbit-style `/v1/candles/*` endpoints (Upbit, Bithumb).
#[derive(Debug, Clone, Deserialize)]
pub struct UpbitCandle {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub candle_date_time_utc: Option<String>,
    /// Time of the last trade in the bar, not the bar start.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub opening_price: f64,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub high_price: f64,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub low_price: f64,
    #[serde(alias = "closing_price", deserialize_with = "string_or_number_to_f64")]
    pub trade_price: f64,
    #[serde(alias = "volume", deserialize_with = "string_or_number_to_f64")]
    pub candle_acc_trade_volume: f64,
    #[serde(default, deserialize_with = "opt_string_or_number_to_f64")]
    pub candle_acc_trade_price: Option<f64>,
}

impl UpbitCandle {
    /// Bar start in epoch ms, from `candle_date_time_utc` when present.
    pub fn start_ms(&self) -> Result<i64> {
        if let Some(s) = self.candle_date_time_utc.as_deref() {
            return parse_utc_ms(s);
        }
        self.timestamp.ok_or_else(|| AppError::MalformedCandle {
            timestamp: 0,
            reason: "missing candle_date_time_utc and timestamp".to_string(),
        })
    }

    pub fn into_candle(self) -> Result<Candle> {
        let candle = Candle {
            timestamp: self.start_ms()?,
            open: self.opening_price,
            high: self.high_price,
            low: self.low_price,
            close: self.trade_price,
            volume: self.candle_acc_trade_volume,
            quote_volume: self.candle_acc_trade_price,
        };
        candle.validate()?;
        Ok(candle)
    }
}

/// Parse "2024-01-01T09:00:00" (UTC, optional trailing `Z`) to epoch ms.
pub fn parse_utc_ms(s: &str) -> Result<i64> {
    let trimmed = s.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.and_utc().timestamp_millis())
        .map_err(|e| AppError::MalformedCandle {
            timestamp: 0,
            reason: format!("bad candle time '{}': {}", s, e),
        })
}

/// Format epoch ms as the `to` cursor accepted by the Upbit-style APIs.
pub fn format_utc_cursor(ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpbitTicker {
    pub market: String,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub trade_price: f64,
    #[serde(default, deserialize_with = "string_or_number_to_f64_default")]
    pub change_rate: f64,
    #[serde(default, deserialize_with = "string_or_number_to_f64_default")]
    pub signed_change_rate: f64,
    #[serde(default, deserialize_with = "string_or_number_to_f64_default")]
    pub acc_trade_volume_24h: f64,
    #[serde(default)]
    pub timestamp: i64,
}

pub fn string_or_number_to_f64_default<'de, D>(
    deserializer: D,
) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(opt_string_or_number_to_f64(deserializer)?.unwrap_or(0.0))
}

impl From<UpbitTicker> for Ticker {
    fn from(t: UpbitTicker) -> Self {
        Ticker {
            market: t.market,
            trade_price: t.trade_price,
            change_rate: t.change_rate,
            signed_change_rate: t.signed_change_rate,
            acc_trade_volume_24h: t.acc_trade_volume_24h,
            timestamp: t.timestamp,
        }
    }
}

/// Market listing row of `/v1/market/all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market: String,
    #[serde(default)]
    pub korean_name: String,
    #[serde(default)]
    pub english_name: String,
}

/// Error body shapes: `{"error": {"name", "message"}}` (Upbit) and
/// `{"status": "5xxx", "message"}` (Bithumb).
pub fn api_error_from_body(body: &str) -> Option<AppError> {
    let v: Value = serde_json::from_str(body).ok()?;
    if let Some(err) = v.get("error") {
        let status = err
            .get("name")
            .map(value_to_string)
            .unwrap_or_else(|| "error".to_string());
        let msg = err.get("message").map(value_to_string).unwrap_or_default();
        return Some(AppError::ExchangeApi { status, msg });
    }
    envelope_error(&v)
}

fn envelope_error(v: &Value) -> Option<AppError> {
    let status = v.get("status")?;
    let status = value_to_string(status);
    if status == "0000" {
        return None;
    }
    let msg = v.get("message").map(value_to_string).unwrap_or_default();
    Some(AppError::ExchangeApi { status, msg })
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accept both a bare payload and the `{status: "0000", data}` envelope.
pub fn unwrap_envelope(v: Value) -> Result<Value> {
    if let Some(err) = envelope_error(&v) {
        return Err(err);
    }
    match v {
        Value::Object(mut map) if map.contains_key("status") => {
            Ok(map.remove("data").unwrap_or(Value::Array(Vec::new())))
        }
        other => Ok(other),
    }
}

/// One row of Binance `GET /api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, ...]`.
pub fn parse_binance_kline(row: &Value) -> Result<Candle> {
    let malformed = |reason: &str| AppError::MalformedCandle {
        timestamp: row.get(0).and_then(Value::as_i64).unwrap_or(0),
        reason: reason.to_string(),
    };
    let cols = row.as_array().ok_or_else(|| malformed("kline row is not an array"))?;
    if cols.len() < 6 {
        return Err(malformed("kline row has fewer than 6 columns"));
    }
    let num = |i: usize, name: &str| {
        value_to_f64(&cols[i]).ok_or_else(|| malformed(&format!("missing {}", name)))
    };
    let candle = Candle {
        timestamp: cols[0].as_i64().ok_or_else(|| malformed("missing open time"))?,
        open: num(1, "open")?,
        high: num(2, "high")?,
        low: num(3, "low")?,
        close: num(4, "close")?,
        volume: num(5, "volume")?,
        quote_volume: cols.get(7).and_then(value_to_f64),
    };
    candle.validate()?;
    Ok(candle)
}

/// Binance `GET /api/v3/ticker/24hr` item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTicker24h {
    pub symbol: String,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub last_price: f64,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub volume: f64,
    #[serde(default)]
    pub close_time: i64,
}

impl From<BinanceTicker24h> for Ticker {
    fn from(t: BinanceTicker24h) -> Self {
        let signed = t.price_change_percent / 100.0;
        Ticker {
            market: t.symbol,
            trade_price: t.last_price,
            change_rate: signed.abs(),
            signed_change_rate: signed,
            acc_trade_volume_24h: t.volume,
            timestamp: t.close_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
