use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::indicator::bollinger::{DEFAULT_BOLLINGER_MULTIPLIER, DEFAULT_BOLLINGER_PERIOD};
use crate::indicator::macd::{DEFAULT_MACD_FAST, DEFAULT_MACD_SIGNAL, DEFAULT_MACD_SLOW};
use crate::indicator::DEFAULT_RSI_PERIOD;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Upper bound on candles per request, for the API, the CLI and the defaults.
pub const MAX_CANDLE_COUNT: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Upbit,
    Bithumb,
    Binance,
}

impl ExchangeKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Upbit => "https://api.upbit.com",
            Self::Bithumb => "https://api.bithumb.com",
            Self::Binance => "https://api.binance.com",
        }
    }
}

impl std::str::FromStr for ExchangeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upbit" => Ok(Self::Upbit),
            "bithumb" => Ok(Self::Bithumb),
            "binance" => Ok(Self::Binance),
            other => bail!(
                "unknown exchange '{}', expected one of upbit/bithumb/binance",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub provider: ExchangeKind,
    #[serde(default)]
    pub rest_base_url: Option<String>,
    #[serde(default = "default_candle_count")]
    pub default_count: usize,
    /// Build 4-hour candles from 60-minute candles even when the exchange
    /// serves them natively.
    #[serde(default)]
    pub synthesize_four_hour: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ExchangeConfig {
    pub fn base_url(&self) -> &str {
        self.rest_base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_periods: vec![20, 50],
            ema_periods: Vec::new(),
            rsi_period: DEFAULT_RSI_PERIOD,
            macd_fast: DEFAULT_MACD_FAST,
            macd_slow: DEFAULT_MACD_SLOW,
            macd_signal: DEFAULT_MACD_SIGNAL,
            bollinger_period: DEFAULT_BOLLINGER_PERIOD,
            bollinger_multiplier: DEFAULT_BOLLINGER_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/coin_tracker.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub price_refresh_secs: u64,
    pub markets: Vec<String>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            price_refresh_secs: 10,
            markets: vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()],
        }
    }
}

impl PollingConfig {
    pub fn normalized_markets(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in &self.markets {
            let s = m.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_candle_count() -> usize {
    100
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if let Ok(provider) = std::env::var("COIN_TRACKER_EXCHANGE") {
            config.exchange.provider = provider
                .parse()
                .context("COIN_TRACKER_EXCHANGE is invalid")?;
        }
        if let Ok(path) = std::env::var("COIN_TRACKER_DB_PATH") {
            config.storage.path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.default_count == 0 || self.exchange.default_count > MAX_CANDLE_COUNT {
            bail!(
                "exchange.default_count must be between 1 and {}",
                MAX_CANDLE_COUNT
            );
        }
        let ind = &self.indicators;
        if ind.sma_periods.iter().chain(&ind.ema_periods).any(|p| *p == 0) {
            bail!("indicators: moving-average periods must be > 0");
        }
        if ind.rsi_period == 0 || ind.bollinger_period == 0 || ind.macd_signal == 0 {
            bail!("indicators: rsi_period, bollinger_period and macd_signal must be > 0");
        }
        if ind.macd_fast == 0 || ind.macd_fast >= ind.macd_slow {
            bail!(
                "indicators: macd_fast ({}) must be > 0 and below macd_slow ({})",
                ind.macd_fast,
                ind.macd_slow
            );
        }
        if !ind.bollinger_multiplier.is_finite() || ind.bollinger_multiplier < 0.0 {
            bail!("indicators.bollinger_multiplier must be a non-negative number");
        }
        if self.polling.price_refresh_secs == 0 {
            bail!("polling.price_refresh_secs must be > 0");
        }
        Ok(())
    }
}
