//! JSON HTTP API over the candle service and the coin registry.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::chart::ChartData;
use crate::error::{AppError, Result};
use crate::exchange::{CandleSource, MarketInfo, MarketSource, TickerSource};
use crate::interval::CandleInterval;
use crate::model::candle::Candle;
use crate::model::coin::{Coin, NewCoin};
use crate::model::ticker::Ticker;
use crate::service::CandleService;
use crate::store::CandleStore;

pub struct AppState<S> {
    pub service: Arc<CandleService<S, CandleStore>>,
    pub store: Arc<CandleStore>,
    pub default_count: usize,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            default_count: self.default_count,
        }
    }
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: CandleSource + TickerSource + MarketSource + 'static,
{
    Router::new()
        .route("/api/coins", get(list_coins::<S>).post(add_coin::<S>))
        .route("/api/coins/favorite", post(toggle_favorite::<S>))
        .route("/api/coins/{symbol}/candles/{unit}/{value}", get(candles::<S>))
        .route("/api/coins/{symbol}/chart/{unit}/{value}", get(chart::<S>))
        .route("/api/prices", get(prices::<S>))
        .route("/api/markets", get(markets::<S>))
        .route("/api/seed", post(seed::<S>))
        .with_state(state)
}

/// Run a registry call on the blocking pool.
async fn with_store<T, F>(store: &Arc<CandleStore>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CandleStore) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| AppError::Other(e.into()))?
}

#[derive(Debug, Default, Deserialize)]
pub struct CoinsQuery {
    #[serde(default)]
    pub favorites: bool,
}

pub async fn list_coins<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<CoinsQuery>,
) -> Result<Json<Vec<Coin>>> {
    let coins = with_store(&state.store, move |s| s.list_coins(query.favorites)).await?;
    Ok(Json(coins))
}

#[derive(Debug, Default, Deserialize)]
pub struct CoinRequest {
    pub symbol: Option<String>,
    pub market: Option<String>,
    pub korean_name: Option<String>,
    pub english_name: Option<String>,
}

impl CoinRequest {
    fn into_new_coin(self) -> Result<NewCoin> {
        fn required(field: &str, v: Option<String>) -> Result<String> {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::invalid_argument(format!("{} is required", field)))
        }
        Ok(NewCoin::new(
            &required("symbol", self.symbol)?,
            &required("market", self.market)?,
            &required("korean_name", self.korean_name)?,
            &required("english_name", self.english_name)?,
        ))
    }
}

pub async fn add_coin<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<CoinRequest>,
) -> Result<(StatusCode, Json<Coin>)> {
    let coin = req.into_new_coin()?;
    let stored = with_store(&state.store, move |s| s.add_coin(&coin)).await?;
    tracing::info!(symbol = %stored.symbol, "Coin registered");
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub symbol: Option<String>,
}

pub async fn toggle_favorite<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<FavoriteRequest>,
) -> Result<Json<Coin>> {
    let symbol = req
        .symbol
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::invalid_argument("symbol is required"))?;
    let lookup = symbol.clone();
    with_store(&state.store, move |s| s.toggle_favorite(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("coin {}", symbol)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CountQuery {
    pub count: Option<usize>,
}

pub async fn candles<S>(
    State(state): State<AppState<S>>,
    Path((symbol, unit, value)): Path<(String, String, String)>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Vec<Candle>>>
where
    S: CandleSource + 'static,
{
    let interval = CandleInterval::from_route(&unit, &value)?;
    let count = query.count.unwrap_or(state.default_count);
    let candles = state.service.load_candles(&symbol, interval, count).await?;
    Ok(Json(candles))
}

pub async fn chart<S>(
    State(state): State<AppState<S>>,
    Path((symbol, unit, value)): Path<(String, String, String)>,
    Query(query): Query<CountQuery>,
) -> Result<Json<ChartData>>
where
    S: CandleSource + 'static,
{
    let interval = CandleInterval::from_route(&unit, &value)?;
    let count = query.count.unwrap_or(state.default_count);
    let chart = state.service.load_chart(&symbol, interval, count).await?;
    Ok(Json(chart))
}

#[derive(Debug, Default, Deserialize)]
pub struct PricesQuery {
    /// Comma separated market codes; defaults to every tracked coin.
    pub markets: Option<String>,
}

pub async fn prices<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<Vec<Ticker>>>
where
    S: CandleSource + TickerSource + 'static,
{
    let markets: Vec<String> = match query.markets.as_deref() {
        Some(list) => list
            .split(',')
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect(),
        None => with_store(&state.store, |s| s.list_coins(false))
            .await?
            .into_iter()
            .map(|c| c.market)
            .collect(),
    };
    if markets.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.service.tickers(&markets).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketsQuery {
    /// Quote currency filter such as `KRW`.
    pub quote: Option<String>,
}

pub async fn markets<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<MarketsQuery>,
) -> Result<Json<Vec<MarketInfo>>>
where
    S: CandleSource + MarketSource + 'static,
{
    Ok(Json(state.service.markets(query.quote.as_deref()).await?))
}

pub async fn seed<S>(State(state): State<AppState<S>>) -> Result<Json<serde_json::Value>> {
    let seeded = with_store(&state.store, |s| s.seed_default_coins()).await?;
    Ok(Json(serde_json::json!({ "seeded": seeded })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::exchange::{BinanceRestClient, Exchange, UpbitRestClient, Venue};
    use axum::response::IntoResponse;

    struct StaticSource;

    impl CandleSource for StaticSource {
        fn supports(&self, interval: CandleInterval) -> bool {
            interval != CandleInterval::Minutes(240)
        }

        async fn fetch_candles(
            &self,
            _symbol: &str,
            _interval: CandleInterval,
            count: usize,
        ) -> anyhow::Result<Vec<Candle>> {
            Ok((0..count as i64)
                .map(|i| Candle::new(i * 60_000, 1.0, 2.0, 0.5, 1.5, 3.0))
                .collect())
        }
    }

    impl TickerSource for StaticSource {
        async fn fetch_tickers(&self, markets: &[String]) -> anyhow::Result<Vec<Ticker>> {
            Ok(markets
                .iter()
                .map(|m| Ticker {
                    market: m.clone(),
                    trade_price: 1.0,
                    change_rate: 0.0,
                    signed_change_rate: 0.0,
                    acc_trade_volume_24h: 0.0,
                    timestamp: 0,
                })
                .collect())
        }
    }

    impl MarketSource for StaticSource {
        async fn fetch_markets(&self) -> anyhow::Result<Vec<MarketInfo>> {
            Ok(["KRW-BTC", "BTC-ETH", "KRW-XRP"]
                .iter()
                .map(|m| MarketInfo {
                    market: m.to_string(),
                    korean_name: String::new(),
                    english_name: m.to_string(),
                })
                .collect())
        }
    }

    fn state_with<S: CandleSource>(source: S) -> AppState<S> {
        let store = Arc::new(CandleStore::open_in_memory().unwrap());
        let service = CandleService::new(
            Arc::new(source),
            Some(Arc::clone(&store)),
            IndicatorConfig::default(),
        );
        AppState {
            service: Arc::new(service),
            store,
            default_count: 100,
        }
    }

    fn state() -> AppState<StaticSource> {
        state_with(StaticSource)
    }

    #[tokio::test]
    async fn candles_default_count_and_bad_unit() {
        let st = state();
        let Json(out) = candles(
            State(st.clone()),
            Path(("KRW-BTC".into(), "minutes".into(), "15".into())),
            Query(CountQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 100);

        let err = candles(
            State(st),
            Path(("KRW-BTC".into(), "hours".into(), "1".into())),
            Query(CountQuery { count: Some(5) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn four_hour_route_is_synthesized() {
        let Json(out) = candles(
            State(state()),
            Path(("KRW-BTC".into(), "minutes".into(), "240".into())),
            Query(CountQuery { count: Some(10) }),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].volume, 12.0);
    }

    #[tokio::test]
    async fn add_requires_every_field() {
        let st = state();
        let err = add_coin(
            State(st.clone()),
            Json(CoinRequest {
                symbol: Some("BTC".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let (status, Json(coin)) = add_coin(
            State(st.clone()),
            Json(CoinRequest {
                symbol: Some("btc".into()),
                market: Some("krw-btc".into()),
                korean_name: Some("비트코인".into()),
                english_name: Some("Bitcoin".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(coin.market, "KRW-BTC");

        let Json(listed) = list_coins(State(st), Query(CoinsQuery::default()))
            .await
            .unwrap();
        assert_eq!(listed, vec![coin]);
    }

    #[tokio::test]
    async fn favorite_unknown_coin_is_404() {
        let err = toggle_favorite(
            State(state()),
            Json(FavoriteRequest {
                symbol: Some("NOPE".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prices_default_to_tracked_markets() {
        let st = state();
        seed(State(st.clone())).await.unwrap();
        let Json(all) = prices(State(st.clone()), Query(PricesQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.len(), crate::store::DEFAULT_COINS.len());

        let Json(some) = prices(
            State(st),
            Query(PricesQuery {
                markets: Some("krw-btc, KRW-ETH,".into()),
            }),
        )
        .await
        .unwrap();
        let markets: Vec<&str> = some.iter().map(|t| t.market.as_str()).collect();
        assert_eq!(markets, vec!["KRW-BTC", "KRW-ETH"]);
    }

    #[test]
    fn router_builds() {
        let _ = router(state());
    }

    #[tokio::test]
    async fn huge_count_is_a_bad_request() {
        let upbit = Exchange::Upbit(
            UpbitRestClient::new(Venue::Upbit, "http://127.0.0.1:9", 1_000).unwrap(),
        );
        let st = state_with(upbit);
        for unit in ["60", "240"] {
            let err = candles(
                State(st.clone()),
                Path(("KRW-BTC".into(), "minutes".into(), unit.into())),
                Query(CountQuery {
                    count: Some(usize::MAX),
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }

        let err = chart(
            State(state()),
            Path(("KRW-BTC".into(), "days".into(), "1".into())),
            Query(CountQuery {
                count: Some(crate::config::MAX_CANDLE_COUNT + 1),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn markets_filter_by_quote() {
        let Json(krw) = markets(
            State(state()),
            Query(MarketsQuery {
                quote: Some("krw".into()),
            }),
        )
        .await
        .unwrap();
        let names: Vec<&str> = krw.iter().map(|m| m.market.as_str()).collect();
        assert_eq!(names, vec!["KRW-BTC", "KRW-XRP"]);

        let Json(all) = markets(State(state()), Query(MarketsQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn markets_on_binance_is_not_implemented() {
        let binance = Exchange::Binance(BinanceRestClient::new("http://127.0.0.1:9", 1_000).unwrap());
        let err = markets(State(state_with(binance)), Query(MarketsQuery::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_IMPLEMENTED);
    }
}
