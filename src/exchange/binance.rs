use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use super::types::{parse_binance_kline, BinanceApiErrorResponse, BinanceTicker24h};
use super::{build_http, finalize_series, CandleSource, RequestCounter, TickerSource};
use crate::error::AppError;
use crate::interval::CandleInterval;
use crate::model::candle::Candle;
use crate::model::ticker::Ticker;

pub const MAX_KLINES_PER_REQUEST: usize = 1000;

pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
    rate: RequestCounter,
}

impl BinanceRestClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            http: build_http(timeout_ms)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            // 1200 request weight per minute
            rate: RequestCounter::new(Duration::from_secs(60), 1200),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.rate.hit("binance");
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("binance GET {} failed", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                return Err(AppError::ExchangeApi {
                    status: err.code.to_string(),
                    msg: err.msg,
                }
                .into());
            }
            anyhow::bail!("binance GET {} returned {}: {}", path, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("binance GET {} JSON parse failed", path))
    }
}

impl CandleSource for BinanceRestClient {
    fn supports(&self, interval: CandleInterval) -> bool {
        interval.binance_code().is_some()
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let code = interval
            .binance_code()
            .ok_or_else(|| AppError::UnsupportedInterval(format!("binance {}", interval)))?;
        let symbol = symbol.trim().to_ascii_uppercase();

        let mut collected: Vec<Candle> = Vec::with_capacity(count.min(MAX_KLINES_PER_REQUEST));
        let mut earliest: Option<i64> = None;

        // Klines come oldest-first; walk backwards with `endTime`.
        while collected.len() < count {
            let limit = (count - collected.len()).min(MAX_KLINES_PER_REQUEST);
            let mut query = vec![
                ("symbol", symbol.clone()),
                ("interval", code.to_string()),
                ("limit", limit.to_string()),
            ];
            if let Some(end) = earliest {
                query.push(("endTime", (end - 1).to_string()));
            }
            let rows = self.get_json("/api/v3/klines", &query).await?;
            let rows = rows
                .as_array()
                .context("binance klines payload is not an array")?;
            let page = rows
                .iter()
                .map(parse_binance_kline)
                .collect::<Result<Vec<_>, _>>()?;

            let exhausted = page.len() < limit;
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
            venue = "binance",
            symbol = %symbol,
            %interval,
            requested = count,
            received = collected.len(),
            "Fetched klines"
        );
        Ok(finalize_series(collected, count))
    }
}

impl TickerSource for BinanceRestClient {
    async fn fetch_tickers(&self, markets: &[String]) -> Result<Vec<Ticker>> {
        if markets.is_empty() {
            return Ok(Vec::new());
        }
        let symbols = serde_json::to_string(markets)?;
        let v = self
            .get_json("/api/v3/ticker/24hr", &[("symbols", symbols)])
            .await?;
        let rows: Vec<BinanceTicker24h> =
            serde_json::from_value(v).context("unexpected 24hr ticker payload")?;
        Ok(rows.into_iter().map(Ticker::from).collect())
    }
}
