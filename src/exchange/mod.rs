pub mod binance;
pub mod types;
pub mod upbit;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::{ExchangeConfig, ExchangeKind};
use crate::error::AppError;
use crate::interval::CandleInterval;
use crate::model::candle::Candle;
use crate::model::ticker::Ticker;

pub use binance::BinanceRestClient;
pub use types::MarketInfo;
pub use upbit::{UpbitRestClient, Venue};

/// Anything that can produce an ascending candle series for a market.
pub trait CandleSource: Send + Sync {
    /// Whether the venue serves `interval` natively.
    fn supports(&self, interval: CandleInterval) -> bool;

    /// Up to `count` most recent candles, ascending by timestamp.
    fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

pub trait TickerSource: Send + Sync {
    fn fetch_tickers(&self, markets: &[String]) -> impl Future<Output = Result<Vec<Ticker>>> + Send;
}

/// Venues that publish a market listing with display names.
pub trait MarketSource: Send + Sync {
    fn fetch_markets(&self) -> impl Future<Output = Result<Vec<MarketInfo>>> + Send;
}

/// Counts requests per window and warns when nearing the venue's limit.
#[derive(Debug)]
pub struct RequestCounter {
    window: Duration,
    warn_at: u64,
    count: AtomicU64,
    window_start: Mutex<Instant>,
}

impl RequestCounter {
    pub fn new(window: Duration, limit: u64) -> Self {
        Self {
            window,
            // 80% of the published limit
            warn_at: limit.saturating_mul(4) / 5,
            count: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Record one request; returns the count in the current window.
    pub fn hit(&self, venue: &str) -> u64 {
        {
            let mut start = self
                .window_start
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if start.elapsed() >= self.window {
                *start = Instant::now();
                self.count.store(0, Ordering::Relaxed);
            }
        }
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count > self.warn_at {
            tracing::warn!(venue, count, "Approaching exchange rate limit");
        }
        count
    }
}

pub(crate) fn build_http(timeout_ms: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(concat!("coin-tracker/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// The configured exchange, dispatched statically.
pub enum Exchange {
    Upbit(UpbitRestClient),
    Binance(BinanceRestClient),
}

impl Exchange {
    pub fn from_config(cfg: &ExchangeConfig) -> Result<Self> {
        let base_url = cfg.base_url();
        Ok(match cfg.provider {
            ExchangeKind::Upbit => {
                Self::Upbit(UpbitRestClient::new(Venue::Upbit, base_url, cfg.request_timeout_ms)?)
            }
            ExchangeKind::Bithumb => Self::Upbit(UpbitRestClient::new(
                Venue::Bithumb,
                base_url,
                cfg.request_timeout_ms,
            )?),
            ExchangeKind::Binance => {
                Self::Binance(BinanceRestClient::new(base_url, cfg.request_timeout_ms)?)
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Upbit(c) => c.venue().name(),
            Self::Binance(_) => "binance",
        }
    }
}

impl CandleSource for Exchange {
    fn supports(&self, interval: CandleInterval) -> bool {
        match self {
            Self::Upbit(c) => c.supports(interval),
            Self::Binance(c) => c.supports(interval),
        }
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>> {
        match self {
            Self::Upbit(c) => c.fetch_candles(symbol, interval, count).await,
            Self::Binance(c) => c.fetch_candles(symbol, interval, count).await,
        }
    }
}

/// Binance has no display names for its symbols and reports `Unsupported`.
impl MarketSource for Exchange {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        match self {
            Self::Upbit(c) => c.fetch_markets().await,
            Self::Binance(_) => Err(AppError::Unsupported(
                "binance does not publish market names".to_string(),
            )
            .into()),
        }
    }
}

impl TickerSource for Exchange {
    async fn fetch_tickers(&self, markets: &[String]) -> Result<Vec<Ticker>> {
        match self {
            Self::Upbit(c) => c.fetch_tickers(markets).await,
            Self::Binance(c) => c.fetch_tickers(markets).await,
        }
    }
}

/// Sort ascending, drop duplicate bars and keep the newest `count`.
pub(crate) fn finalize_series(mut candles: Vec<Candle>, count: usize) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    if candles.len() > count {
        candles.drain(..candles.len() - count);
    }
    candles
}
