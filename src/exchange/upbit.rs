use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use super::types::{
    api_error_from_body, format_utc_cursor, unwrap_envelope, MarketInfo, UpbitCandle, UpbitTicker,
};
use super::{build_http, finalize_series, CandleSource, RequestCounter, TickerSource};
use crate::interval::CandleInterval;
use crate::model::candle::Candle;
use crate::model::ticker::Ticker;

/// Largest `count` the candle endpoints accept per request.
pub const MAX_CANDLES_PER_REQUEST: usize = 200;

/// Exchanges that expose the Upbit-style `/v1` market-data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Upbit,
    Bithumb,
}

impl Venue {
    pub fn name(self) -> &'static str {
        match self {
            Self::Upbit => "upbit",
            Self::Bithumb => "bithumb",
        }
    }

    /// Public market-data quota per second.
    fn requests_per_second(self) -> u64 {
        match self {
            Self::Upbit => 10,
            Self::Bithumb => 15,
        }
    }
}

pub struct UpbitRestClient {
    http: reqwest::Client,
    base_url: String,
    venue: Venue,
    rate: RequestCounter,
}

impl UpbitRestClient {
    pub fn new(venue: Venue, base_url: &str, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            http: build_http(timeout_ms)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            venue,
            rate: RequestCounter::new(Duration::from_secs(1), venue.requests_per_second()),
        })
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.rate.hit(self.venue.name());
        let url = format!("{}/v1/{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("{} GET {} failed", self.venue.name(), path))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("{} GET {} body read failed", self.venue.name(), path))?;
        if !status.is_success() {
            if let Some(err) = api_error_from_body(&body) {
                return Err(err.into());
            }
            anyhow::bail!("{} GET {} returned {}: {}", self.venue.name(), path, status, body);
        }

        let v: Value = serde_json::from_str(&body)
            .with_context(|| format!("{} GET {} JSON parse failed", self.venue.name(), path))?;
        Ok(unwrap_envelope(v)?)
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
        to: Option<&str>,
    ) -> Result<Vec<Candle>> {
        let mut query = vec![("market", symbol.to_string()), ("count", count.to_string())];
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        let rows: Vec<UpbitCandle> = serde_json::from_value(
            self.get_json(&interval.candles_path(), &query).await?,
        )
        .context("unexpected candle payload")?;
        rows.into_iter()
            .map(|r| r.into_candle().map_err(anyhow::Error::from))
            .collect()
    }

    /// All markets listed on the venue.
    pub async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        let v = self
            .get_json("market/all", &[("isDetails", "false".to_string())])
            .await?;
        serde_json::from_value(v).context("unexpected market/all payload")
    }
}

impl CandleSource for UpbitRestClient {
    fn supports(&self, interval: CandleInterval) -> bool {
        match (self.venue, interval) {
            (Venue::Bithumb, CandleInterval::Minutes(240)) => false,
            (_, CandleInterval::Minutes(n)) => crate::interval::MINUTE_UNITS.contains(&n),
            _ => true,
        }
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let mut collected: Vec<Candle> = Vec::with_capacity(count.min(MAX_CANDLES_PER_REQUEST));
        let mut earliest: Option<i64> = None;

        // Pages come newest-first; walk backwards with the `to` cursor. Some
        // venues return the cursor bar itself, so follow-up pages ask for one
        // extra row and drop anything not older than what is already held.
        while collected.len() < count {
            let remaining = count - collected.len();
            let cursor = earliest.and_then(format_utc_cursor);
            let wanted = if cursor.is_some() {
                remaining.saturating_add(1)
            } else {
                remaining
            };
            let page_size = wanted.min(MAX_CANDLES_PER_REQUEST);
            let page = self
                .fetch_page(symbol, interval, page_size, cursor.as_deref())
                .await?;
            let exhausted = page.len() < page_size;
            let before = collected.len();
            collected.extend(
                page.into_iter()
                    .filter(|c| earliest.map_or(true, |e| c.timestamp < e)),
            );
            let Some(oldest) = collected[before..].iter().map(|c| c.timestamp).min() else {
                break;
            };
            earliest = Some(oldest);
            if exhausted {
                break;
            }
        }

        tracing::debug!(
            venue = self.venue.name(),
            symbol,
            %interval,
            requested = count,
            received = collected.len(),
            "Fetched candles"
        );
        Ok(finalize_series(collected, count))
    }
}

impl TickerSource for UpbitRestClient {
    async fn fetch_tickers(&self, markets: &[String]) -> Result<Vec<Ticker>> {
        if markets.is_empty() {
            return Ok(Vec::new());
        }
        let v = self
            .get_json("ticker", &[("markets", markets.join(","))])
            .await?;
        let rows: Vec<UpbitTicker> =
            serde_json::from_value(v).context("unexpected ticker payload")?;
        Ok(rows.into_iter().map(Ticker::from).collect())
    }
}
