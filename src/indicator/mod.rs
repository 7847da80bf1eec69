//! Closed-form technical indicators over closing-price series.
//!
//! Batch functions take `&[f64]` and always return freshly allocated
//! output. Windowed indicators mark missing history with `None`.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{bollinger, BollingerBands};
pub use ema::{ema, Ema};
pub use macd::{macd, macd_default, Macd};
pub use rsi::{rsi, rsi_aligned, Rsi, DEFAULT_RSI_PERIOD};
pub use sma::sma;

use crate::error::{AppError, Result};

pub(crate) fn ensure_period(name: &str, period: usize) -> Result<()> {
    if period == 0 {
        return Err(AppError::invalid_argument(format!(
            "{} period must be > 0",
            name
        )));
    }
    Ok(())
}
