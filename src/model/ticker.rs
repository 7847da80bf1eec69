use serde::{Deserialize, Serialize};

/// Latest traded price for one market, as shown in the coin list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub market: String,
    pub trade_price: f64,
    /// Unsigned fractional change since the previous close.
    pub change_rate: f64,
    pub signed_change_rate: f64,
    pub acc_trade_volume_24h: f64,
    pub timestamp: i64,
}
