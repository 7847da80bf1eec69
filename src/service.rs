use std::sync::Arc;

use crate::aggregate::{aggregate, group_size_for};
use crate::chart::ChartData;
use crate::config::{IndicatorConfig, MAX_CANDLE_COUNT};
use crate::error::{AppError, Result};
use crate::exchange::{CandleSource, MarketInfo, MarketSource, TickerSource};
use crate::interval::CandleInterval;
use crate::model::candle::Candle;
use crate::model::ticker::Ticker;
use crate::store::CandleSink;

const FOUR_HOUR_MINUTES: u32 = 240;
const HOUR_MINUTES: u32 = 60;
const FOUR_HOURS: CandleInterval = CandleInterval::Minutes(FOUR_HOUR_MINUTES);
const ONE_HOUR: CandleInterval = CandleInterval::Minutes(HOUR_MINUTES);

/// Resolves candle requests against an exchange, synthesizing 4-hour bars
/// where needed, and hands results to an optional sink.
pub struct CandleService<S, P> {
    source: Arc<S>,
    sink: Option<Arc<P>>,
    indicators: IndicatorConfig,
    synthesize_four_hour: bool,
}

impl<S: CandleSource, P: CandleSink> CandleService<S, P> {
    pub fn new(source: Arc<S>, sink: Option<Arc<P>>, indicators: IndicatorConfig) -> Self {
        Self {
            source,
            sink,
            indicators,
            synthesize_four_hour: false,
        }
    }

    pub fn with_four_hour_synthesis(mut self, enabled: bool) -> Self {
        self.synthesize_four_hour = enabled;
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn indicators(&self) -> &IndicatorConfig {
        &self.indicators
    }

    fn synthesizes(&self, interval: CandleInterval) -> bool {
        interval == FOUR_HOURS && (self.synthesize_four_hour || !self.source.supports(FOUR_HOURS))
    }

    /// Up to `count` most recent candles for `symbol`, ascending.
    pub async fn load_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>> {
        if count == 0 || count > MAX_CANDLE_COUNT {
            return Err(AppError::invalid_argument(format!(
                "count must be between 1 and {}, got {}",
                MAX_CANDLE_COUNT, count
            )));
        }
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(AppError::invalid_argument("symbol must not be empty"));
        }

        let candles = if self.synthesizes(interval) {
            let group = group_size_for(FOUR_HOUR_MINUTES, HOUR_MINUTES)?;
            let hourly = self
                .source
                .fetch_candles(&symbol, ONE_HOUR, count * group)
                .await
                .map_err(AppError::from_anyhow)?;
            let mut merged = aggregate(&hourly, group)?;
            if merged.len() > count {
                merged.drain(..merged.len() - count);
            }
            tracing::info!(
                symbol = %symbol,
                hourly = hourly.len(),
                count = merged.len(),
                "Synthesized 4-hour candles"
            );
            merged
        } else {
            if !self.source.supports(interval) {
                return Err(AppError::UnsupportedInterval(interval.to_string()));
            }
            self.source
                .fetch_candles(&symbol, interval, count)
                .await
                .map_err(AppError::from_anyhow)?
        };

        self.persist(symbol, interval, &candles);
        Ok(candles)
    }

    pub async fn load_chart(
        &self,
        symbol: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<ChartData> {
        let candles = self.load_candles(symbol, interval, count).await?;
        ChartData::build(candles, &self.indicators)
    }

    /// Fire-and-forget write on the blocking pool; failures are only logged.
    fn persist(&self, symbol: String, interval: CandleInterval, candles: &[Candle]) {
        let Some(sink) = self.sink.as_ref().map(Arc::clone) else {
            return;
        };
        if candles.is_empty() {
            return;
        }
        let rows = candles.to_vec();
        let candle_type = interval.candle_type();
        tokio::task::spawn_blocking(move || {
            match sink.persist_candles(&symbol, &rows, candle_type) {
                Ok(written) => {
                    tracing::debug!(symbol = %symbol, written, "Persisted candles")
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Failed to persist candles")
                }
            }
        });
    }
}

impl<S: CandleSource + TickerSource, P: CandleSink> CandleService<S, P> {
    pub async fn tickers(&self, markets: &[String]) -> Result<Vec<Ticker>> {
        self.source
            .fetch_tickers(markets)
            .await
            .map_err(AppError::from_anyhow)
    }
}

impl<S: CandleSource + MarketSource, P: CandleSink> CandleService<S, P> {
    /// Venue markets quoted in `quote` (e.g. "KRW"), or all of them.
    pub async fn markets(&self, quote: Option<&str>) -> Result<Vec<MarketInfo>> {
        let mut markets = self
            .source
            .fetch_markets()
            .await
            .map_err(AppError::from_anyhow)?;
        if let Some(quote) = quote.map(str::trim).filter(|q| !q.is_empty()) {
            let prefix = format!("{}-", quote.to_ascii_uppercase());
            markets.retain(|m| m.market.starts_with(&prefix));
        }
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::CandleType;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Serves `count` rising hourly-spaced bars for whatever is asked.
    struct FakeSource {
        native_four_hour: bool,
        calls: Mutex<Vec<(CandleInterval, usize)>>,
    }

    impl FakeSource {
        fn new(native_four_hour: bool) -> Self {
            Self {
                native_four_hour,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CandleSource for FakeSource {
        fn supports(&self, interval: CandleInterval) -> bool {
            interval != FOUR_HOURS || self.native_four_hour
        }

        async fn fetch_candles(
            &self,
            _symbol: &str,
            interval: CandleInterval,
            count: usize,
        ) -> anyhow::Result<Vec<Candle>> {
            self.calls.lock().unwrap().push((interval, count));
            Ok((0..count)
                .map(|i| {
                    let p = 100.0 + i as f64;
                    Candle::new(i as i64 * 3_600_000, p, p + 2.0, p - 2.0, p + 1.0, 1.0)
                })
                .collect())
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<(String, usize, CandleType)>);

    impl CandleSink for ChannelSink {
        fn persist_candles(
            &self,
            symbol: &str,
            candles: &[Candle],
            candle_type: CandleType,
        ) -> Result<usize> {
            let _ = self.0.send((symbol.to_string(), candles.len(), candle_type));
            Ok(candles.len())
        }
    }

    struct FailingSink;

    impl CandleSink for FailingSink {
        fn persist_candles(&self, _: &str, _: &[Candle], _: CandleType) -> Result<usize> {
            Err(AppError::NotFound("disk".to_string()))
        }
    }

    #[test]
    fn four_hour_is_synthesized_when_not_native() {
        let source = Arc::new(FakeSource::new(false));
        let service: CandleService<_, ChannelSink> =
            CandleService::new(Arc::clone(&source), None, IndicatorConfig::default());

        let out = tokio_test::block_on(service.load_candles("krw-btc", FOUR_HOURS, 5)).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(source.calls.lock().unwrap().as_slice(), &[(ONE_HOUR, 20)]);
        // First group covers hourly bars 0..4.
        assert_eq!(out[0].open, 100.0);
        assert_eq!(out[0].close, 104.0);
        assert_eq!(out[0].high, 105.0);
        assert_eq!(out[0].low, 98.0);
        assert_eq!(out[0].volume, 4.0);
        assert_eq!(out[1].timestamp - out[0].timestamp, 4 * 3_600_000);
    }

    #[test]
    fn native_four_hour_is_fetched_directly() {
        let source = Arc::new(FakeSource::new(true));
        let service: CandleService<_, ChannelSink> =
            CandleService::new(Arc::clone(&source), None, IndicatorConfig::default());
        tokio_test::block_on(service.load_candles("KRW-BTC", FOUR_HOURS, 3)).unwrap();
        assert_eq!(source.calls.lock().unwrap().as_slice(), &[(FOUR_HOURS, 3)]);

        let forced: CandleService<_, ChannelSink> =
            CandleService::new(Arc::clone(&source), None, IndicatorConfig::default())
                .with_four_hour_synthesis(true);
        tokio_test::block_on(forced.load_candles("KRW-BTC", FOUR_HOURS, 3)).unwrap();
        assert_eq!(source.calls.lock().unwrap().last(), Some(&(ONE_HOUR, 12)));
    }

    #[test]
    fn zero_count_is_rejected() {
        let service: CandleService<_, ChannelSink> = CandleService::new(
            Arc::new(FakeSource::new(true)),
            None,
            IndicatorConfig::default(),
        );
        let err = tokio_test::block_on(service.load_candles("KRW-BTC", ONE_HOUR, 0)).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn oversized_count_never_reaches_the_source() {
        let source = Arc::new(FakeSource::new(false));
        let service: CandleService<_, ChannelSink> =
            CandleService::new(Arc::clone(&source), None, IndicatorConfig::default());
        for (interval, count) in [
            (ONE_HOUR, MAX_CANDLE_COUNT + 1),
            (FOUR_HOURS, usize::MAX),
            (CandleInterval::Days, usize::MAX),
        ] {
            let err = tokio_test::block_on(service.load_candles("KRW-BTC", interval, count))
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "{:?}", err);
        }
        assert!(source.calls.lock().unwrap().is_empty());

        let out = tokio_test::block_on(service.load_candles("KRW-BTC", FOUR_HOURS, MAX_CANDLE_COUNT))
            .unwrap();
        assert_eq!(out.len(), MAX_CANDLE_COUNT);
    }

    #[tokio::test]
    async fn candles_are_handed_to_the_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = CandleService::new(
            Arc::new(FakeSource::new(true)),
            Some(Arc::new(ChannelSink(tx))),
            IndicatorConfig::default(),
        );
        service
            .load_candles("krw-eth", CandleInterval::Days, 7)
            .await
            .unwrap();

        let (symbol, written, candle_type) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(symbol, "KRW-ETH");
        assert_eq!(written, 7);
        assert_eq!(candle_type, CandleType::Day);
    }

    #[tokio::test]
    async fn sink_failure_does_not_fail_the_request() {
        let service = CandleService::new(
            Arc::new(FakeSource::new(true)),
            Some(Arc::new(FailingSink)),
            IndicatorConfig::default(),
        );
        let out = service.load_candles("KRW-BTC", ONE_HOUR, 4).await.unwrap();
        assert_eq!(out.len(), 4);
    }

    #[tokio::test]
    async fn chart_is_built_from_loaded_candles() {
        let service: CandleService<_, ChannelSink> = CandleService::new(
            Arc::new(FakeSource::new(true)),
            None,
            IndicatorConfig::default(),
        );
        let chart = service.load_chart("KRW-BTC", ONE_HOUR, 40).await.unwrap();
        assert_eq!(chart.candles.len(), 40);
        assert_eq!(chart.rsi.points.len(), 40);
        assert_eq!(chart.rsi.latest(), Some(100.0));
    }
}
