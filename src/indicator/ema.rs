use super::ensure_period;
use crate::error::Result;

/// Exponential Moving Average seeded with the first observed value.
#[derive(Debug, Clone)]
pub struct Ema {
    multiplier: f64,
    ema: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self> {
        ensure_period("EMA", period)?;
        Ok(Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            ema: None,
        })
    }

    /// Push a new value and return the updated EMA.
    pub fn push(&mut self, value: f64) -> f64 {
        let next = match self.ema {
            Some(prev) => value * self.multiplier + prev * (1.0 - self.multiplier),
            None => value,
        };
        self.ema = Some(next);
        next
    }
}

/// Full-length EMA: `ema[0] = prices[0]`, no warm-up sentinels.
pub fn ema(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    let mut state = Ema::new(period)?;
    Ok(prices.iter().map(|p| state.push(*p)).collect())
}
