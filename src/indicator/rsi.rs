use super::ensure_period;
use crate::error::Result;

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Wilder-smoothed Relative Strength Index.
///
/// The first value is produced once `period` price changes have been seen,
/// i.e. on the `period + 1`-th pushed price.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_price: Option<f64>,
    seed_gain: f64,
    seed_loss: f64,
    seen_deltas: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self> {
        ensure_period("RSI", period)?;
        Ok(Self {
            period,
            prev_price: None,
            seed_gain: 0.0,
            seed_loss: 0.0,
            seen_deltas: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        })
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        let prev = self.prev_price.replace(price)?;
        let delta = price - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.seen_deltas += 1;

        if self.seen_deltas < self.period {
            self.seed_gain += gain;
            self.seed_loss += loss;
            return None;
        }
        if self.seen_deltas == self.period {
            self.avg_gain = (self.seed_gain + gain) / self.period as f64;
            self.avg_loss = (self.seed_loss + loss) / self.period as f64;
        } else {
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }
        Some(rsi_from_averages(self.avg_gain, self.avg_loss))
    }
}

/// `100 - 100 / (1 + avg_gain / avg_loss)` with the zero-loss cases pinned:
/// only gains gives 100, a flat window gives 50.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain > 0.0 {
            return 100.0;
        }
        if avg_gain == 0.0 {
            return 50.0;
        }
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI values starting at input index `period`; the output holds
/// `prices.len() - period` values (empty when there is not enough history).
pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    let mut state = Rsi::new(period)?;
    Ok(prices.iter().filter_map(|p| state.push(*p)).collect())
}

/// Same as [`rsi`], front-padded with `None` so index `i` matches `prices[i]`.
pub fn rsi_aligned(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut state = Rsi::new(period)?;
    Ok(prices.iter().map(|p| state.push(*p)).collect())
}
