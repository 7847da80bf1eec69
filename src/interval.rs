use std::fmt;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::candle::CandleType;

/// Minute units served by the Korean exchanges' minute-candle endpoints.
pub const MINUTE_UNITS: [u32; 8] = [1, 3, 5, 10, 15, 30, 60, 240];

const MINUTE_MS: u64 = 60_000;
const DAY_MS: u64 = 86_400_000;

/// Split an interval code into its quantity and unit suffix ("15m" -> (15, 'm')).
fn split_interval_code(s: &str) -> anyhow::Result<(u64, char)> {
    let Some((idx, suffix)) = s.char_indices().last() else {
        bail!("invalid interval '{}': expected format like '1m'", s);
    };
    if idx == 0 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }
    let n: u64 = s[..idx].parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }
    Ok((n, suffix))
}

/// Parse an exchange interval code (e.g. "1s", "1m", "4h", "1d", "1w", "1M")
/// into milliseconds. A month counts as 30 days.
pub fn parse_interval_ms(s: &str) -> anyhow::Result<u64> {
    let (n, suffix) = split_interval_code(s)?;
    let unit_ms = match suffix {
        's' => 1_000,
        'm' => MINUTE_MS,
        'h' => 3_600_000,
        'd' => DAY_MS,
        'w' => 7 * DAY_MS,
        'M' => 30 * DAY_MS,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

/// Candle granularity as requested by a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    Minutes(u32),
    Days,
    Weeks,
    Months,
}

impl CandleInterval {
    pub fn minutes(unit: u32) -> Result<Self> {
        if MINUTE_UNITS.contains(&unit) {
            Ok(Self::Minutes(unit))
        } else {
            Err(AppError::UnsupportedInterval(format!(
                "minutes/{} (supported: {:?})",
                unit, MINUTE_UNITS
            )))
        }
    }

    /// Build from the `/candles/{unit}/{value}` route segments. `value` is
    /// only meaningful for minute candles.
    pub fn from_route(unit: &str, value: &str) -> Result<Self> {
        match unit.trim().to_ascii_lowercase().as_str() {
            "minutes" | "minute" => {
                let n: u32 = value.trim().parse().map_err(|_| {
                    AppError::UnsupportedInterval(format!("minutes/{}", value))
                })?;
                Self::minutes(n)
            }
            "days" | "day" => Ok(Self::Days),
            "weeks" | "week" => Ok(Self::Weeks),
            "months" | "month" => Ok(Self::Months),
            other => Err(AppError::UnsupportedInterval(format!("{}/{}", other, value))),
        }
    }

    /// Build from an exchange code such as "15m", "4h" or "1d". Day, week
    /// and month candles only exist in single units.
    pub fn from_code(code: &str) -> Result<Self> {
        let unsupported = |e: anyhow::Error| AppError::UnsupportedInterval(format!("{:#}", e));
        let (n, suffix) = split_interval_code(code).map_err(unsupported)?;
        match (suffix, n) {
            ('d', 1) => Ok(Self::Days),
            ('w', 1) => Ok(Self::Weeks),
            ('M', 1) => Ok(Self::Months),
            ('m' | 'h', _) => {
                let ms = parse_interval_ms(code).map_err(unsupported)?;
                let minutes = u32::try_from(ms / MINUTE_MS)
                    .map_err(|_| AppError::UnsupportedInterval(code.to_string()))?;
                Self::minutes(minutes)
            }
            _ => Err(AppError::UnsupportedInterval(code.to_string())),
        }
    }

    pub fn candle_type(self) -> CandleType {
        match self {
            Self::Minutes(_) => CandleType::Minute,
            Self::Days => CandleType::Day,
            Self::Weeks => CandleType::Week,
            Self::Months => CandleType::Month,
        }
    }

    /// Path segment under `/v1/` on Upbit-style REST APIs.
    pub fn candles_path(self) -> String {
        match self {
            Self::Minutes(n) => format!("candles/minutes/{}", n),
            Self::Days => "candles/days".to_string(),
            Self::Weeks => "candles/weeks".to_string(),
            Self::Months => "candles/months".to_string(),
        }
    }

    /// Binance kline interval code; `None` where Binance has no such interval.
    pub fn binance_code(self) -> Option<&'static str> {
        match self {
            Self::Minutes(1) => Some("1m"),
            Self::Minutes(3) => Some("3m"),
            Self::Minutes(5) => Some("5m"),
            Self::Minutes(15) => Some("15m"),
            Self::Minutes(30) => Some("30m"),
            Self::Minutes(60) => Some("1h"),
            Self::Minutes(240) => Some("4h"),
            Self::Minutes(_) => None,
            Self::Days => Some("1d"),
            Self::Weeks => Some("1w"),
            Self::Months => Some("1M"),
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(n) => write!(f, "minutes/{}", n),
            Self::Days => f.write_str("days"),
            Self::Weeks => f.write_str("weeks"),
            Self::Months => f.write_str("months"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
        assert!(parse_interval_ms("1é").is_err());
        assert!(parse_interval_ms("é").is_err());
    }

    #[test]
    fn route_segments() {
        assert_eq!(
            CandleInterval::from_route("minutes", "240").unwrap(),
            CandleInterval::Minutes(240)
        );
        assert_eq!(
            CandleInterval::from_route("days", "1").unwrap(),
            CandleInterval::Days
        );
        assert!(CandleInterval::from_route("minutes", "7").is_err());
        assert!(CandleInterval::from_route("minutes", "abc").is_err());
        assert!(CandleInterval::from_route("years", "1").is_err());
    }

    #[test]
    fn exchange_codes() {
        assert_eq!(
            CandleInterval::from_code("4h").unwrap(),
            CandleInterval::Minutes(240)
        );
        assert_eq!(CandleInterval::from_code("1w").unwrap(), CandleInterval::Weeks);
        assert_eq!(CandleInterval::from_code("1M").unwrap(), CandleInterval::Months);
        assert!(CandleInterval::from_code("1s").is_err());
        assert!(CandleInterval::from_code("2h").is_err());
        assert!(CandleInterval::from_code("60m").is_ok());
    }

    #[test]
    fn day_based_codes_match_on_suffix() {
        assert_eq!(CandleInterval::from_code("1d").unwrap(), CandleInterval::Days);
        assert!(CandleInterval::from_code("7d").is_err());
        assert!(CandleInterval::from_code("30d").is_err());
        assert!(CandleInterval::from_code("2w").is_err());
        assert!(CandleInterval::from_code("24h").is_err());
    }

    #[test]
    fn multibyte_suffix_is_an_error_not_a_panic() {
        assert!(matches!(
            CandleInterval::from_code("1é"),
            Err(AppError::UnsupportedInterval(_))
        ));
        assert!(CandleInterval::from_code("1분").is_err());
    }

    #[test]
    fn derived_properties() {
        let four_hour = CandleInterval::Minutes(240);
        assert_eq!(four_hour.candle_type(), CandleType::Minute);
        assert_eq!(four_hour.candles_path(), "candles/minutes/240");
        assert_eq!(four_hour.binance_code(), Some("4h"));
        assert_eq!(CandleInterval::Minutes(10).binance_code(), None);
        assert_eq!(CandleInterval::Weeks.to_string(), "weeks");
    }
}
