//! Candle series plus the indicator overlays drawn on top of them, aligned
//! to candle timestamps.

use serde::Serialize;

use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::indicator::{bollinger, ema, macd, rsi, sma};
use crate::model::candle::Candle;

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub name: String,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Pair values 1:1 with candles.
    pub fn from_aligned(name: impl Into<String>, candles: &[Candle], values: &[Option<f64>]) -> Result<Self> {
        if values.len() != candles.len() {
            return Err(AppError::invalid_argument(format!(
                "series length {} does not match {} candles",
                values.len(),
                candles.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            points: candles
                .iter()
                .zip(values)
                .map(|(c, v)| IndicatorPoint {
                    timestamp: c.timestamp,
                    value: *v,
                })
                .collect(),
        })
    }

    /// Pair values with candles starting at `offset`; the first `offset`
    /// points are `None`.
    pub fn from_offset(
        name: impl Into<String>,
        candles: &[Candle],
        offset: usize,
        values: &[f64],
    ) -> Result<Self> {
        let expected = candles.len().saturating_sub(offset);
        if values.len() != expected {
            return Err(AppError::invalid_argument(format!(
                "series length {} does not fit {} candles at offset {}",
                values.len(),
                candles.len(),
                offset
            )));
        }
        let padded: Vec<Option<f64>> = std::iter::repeat(None)
            .take(candles.len() - expected)
            .chain(values.iter().copied().map(Some))
            .collect();
        Self::from_aligned(name, candles, &padded)
    }

    fn from_full(name: impl Into<String>, candles: &[Candle], values: &[f64]) -> Result<Self> {
        Self::from_offset(name, candles, 0, values)
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|p| p.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdOverlay {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerOverlay {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// Everything a price chart needs for one symbol and interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub candles: Vec<Candle>,
    pub sma: Vec<IndicatorSeries>,
    pub ema: Vec<IndicatorSeries>,
    pub rsi: IndicatorSeries,
    pub macd: MacdOverlay,
    pub bollinger: BollingerOverlay,
}

impl ChartData {
    pub fn build(candles: Vec<Candle>, cfg: &IndicatorConfig) -> Result<Self> {
        let prices = closes(&candles);

        let sma_lines = cfg
            .sma_periods
            .iter()
            .map(|p| IndicatorSeries::from_aligned(format!("SMA({})", p), &candles, &sma(&prices, *p)?))
            .collect::<Result<Vec<_>>>()?;
        let ema_lines = cfg
            .ema_periods
            .iter()
            .map(|p| IndicatorSeries::from_full(format!("EMA({})", p), &candles, &ema(&prices, *p)?))
            .collect::<Result<Vec<_>>>()?;

        let rsi_values = rsi(&prices, cfg.rsi_period)?;
        let rsi_series = IndicatorSeries::from_offset(
            format!("RSI({})", cfg.rsi_period),
            &candles,
            cfg.rsi_period.min(candles.len()),
            &rsi_values,
        )?;

        let m = macd(&prices, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)?;
        let macd_overlay = MacdOverlay {
            macd: IndicatorSeries::from_full(
                format!("MACD({}, {})", cfg.macd_fast, cfg.macd_slow),
                &candles,
                &m.macd_line,
            )?,
            signal: IndicatorSeries::from_full(
                format!("Signal({})", cfg.macd_signal),
                &candles,
                &m.signal,
            )?,
            histogram: IndicatorSeries::from_full("Histogram", &candles, &m.histogram)?,
        };

        let bb = bollinger(&prices, cfg.bollinger_period, cfg.bollinger_multiplier)?;
        let bb_label = format!("BB({}, {})", cfg.bollinger_period, cfg.bollinger_multiplier);
        let bollinger_overlay = BollingerOverlay {
            upper: IndicatorSeries::from_aligned(format!("{} upper", bb_label), &candles, &bb.upper)?,
            middle: IndicatorSeries::from_aligned(format!("{} middle", bb_label), &candles, &bb.middle)?,
            lower: IndicatorSeries::from_aligned(format!("{} lower", bb_label), &candles, &bb.lower)?,
        };

        Ok(Self {
            candles,
            sma: sma_lines,
            ema: ema_lines,
            rsi: rsi_series,
            macd: macd_overlay,
            bollinger: bollinger_overlay,
        })
    }
}
