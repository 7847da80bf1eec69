pub mod candle;
pub mod coin;
pub mod ticker;

pub use candle::{Candle, CandleType};
pub use coin::{Coin, NewCoin};
pub use ticker::Ticker;
