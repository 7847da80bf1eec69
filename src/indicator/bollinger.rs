use serde::Serialize;

use super::ensure_period;
use super::sma::sma;
use crate::error::{AppError, Result};

pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
pub const DEFAULT_BOLLINGER_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// SMA envelope at `multiplier` population standard deviations of the same
/// window. Indices without a full window are `None` in all three bands.
pub fn bollinger(prices: &[f64], period: usize, multiplier: f64) -> Result<BollingerBands> {
    ensure_period("Bollinger", period)?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(AppError::invalid_argument(format!(
            "Bollinger multiplier must be a finite non-negative number, got {}",
            multiplier
        )));
    }
    let middle = sma(prices, period)?;
    let mut upper = Vec::with_capacity(prices.len());
    let mut lower = Vec::with_capacity(prices.len());

    for (i, mean) in middle.iter().enumerate() {
        let Some(mean) = *mean else {
            upper.push(None);
            lower.push(None);
            continue;
        };
        let window = &prices[i + 1 - period..=i];
        let variance = window
            .iter()
            .map(|p| {
                let d = *p - mean;
                d * d
            })
            .sum::<f64>()
            / period as f64;
        let band = multiplier * variance.sqrt();
        upper.push(Some(mean + band));
        lower.push(Some(mean - band));
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}
