use super::ensure_period;
use crate::error::Result;

/// Windowed mean of `prices`, index-aligned with the input.
///
/// Index `i < period - 1` is `None`. When `period > prices.len()` every
/// entry is `None`.
pub fn sma(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    ensure_period("SMA", period)?;
    let mut out = Vec::with_capacity(prices.len());
    for i in 0..prices.len() {
        if i + 1 < period {
            out.push(None);
            continue;
        }
        // Summing each window keeps NaN local to the windows that contain it.
        let window = &prices[i + 1 - period..=i];
        out.push(Some(window.iter().sum::<f64>() / period as f64));
    }
    Ok(out)
}
