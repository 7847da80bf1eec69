use serde::{Deserialize, Serialize};

/// A tracked coin. `symbol` is the ticker (`BTC`), `market` the exchange
/// market code (`KRW-BTC`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: i64,
    pub symbol: String,
    pub market: String,
    pub korean_name: String,
    pub english_name: String,
    pub is_favorite: bool,
}

/// Fields accepted when registering a coin; `id` and `is_favorite` are
/// owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoin {
    pub symbol: String,
    pub market: String,
    pub korean_name: String,
    pub english_name: String,
}

impl NewCoin {
    pub fn new(symbol: &str, market: &str, korean_name: &str, english_name: &str) -> Self {
        Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            market: market.trim().to_ascii_uppercase(),
            korean_name: korean_name.to_string(),
            english_name: english_name.to_string(),
        }
    }
}
