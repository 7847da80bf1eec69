use serde::Serialize;

use super::ema::ema;
use crate::error::Result;

pub const DEFAULT_MACD_FAST: usize = 12;
pub const DEFAULT_MACD_SLOW: usize = 26;
pub const DEFAULT_MACD_SIGNAL: usize = 9;

/// MACD line, its signal EMA and the histogram, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Macd {
    pub macd_line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn len(&self) -> usize {
        self.macd_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macd_line.is_empty()
    }
}

pub fn macd(prices: &[f64], fast: usize, slow: usize, signal_period: usize) -> Result<Macd> {
    let fast_ema = ema(prices, fast)?;
    let slow_ema = ema(prices, slow)?;
    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&macd_line, signal_period)?;
    let histogram = macd_line.iter().zip(&signal).map(|(m, s)| m - s).collect();
    Ok(Macd {
        macd_line,
        signal,
        histogram,
    })
}

/// MACD with the conventional (12, 26, 9) periods.
pub fn macd_default(prices: &[f64]) -> Result<Macd> {
    macd(
        prices,
        DEFAULT_MACD_FAST,
        DEFAULT_MACD_SLOW,
        DEFAULT_MACD_SIGNAL,
    )
}
