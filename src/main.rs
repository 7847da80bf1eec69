use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::sync::watch;

use coin_tracker::api::{self, AppState};
use coin_tracker::config::{Config, LoggingConfig, StorageConfig};
use coin_tracker::exchange::Exchange;
use coin_tracker::input::{parse_command, Command, USAGE};
use coin_tracker::model::candle::Candle;
use coin_tracker::model::coin::{Coin, NewCoin};
use coin_tracker::poller::spawn_poller;
use coin_tracker::service::CandleService;
use coin_tracker::store::CandleStore;

type Service = CandleService<Exchange, CandleStore>;

/// Markets per ticker request in `watch`.
const TICKER_BATCH: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists and is valid");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    tracing::info!(
        exchange = ?config.exchange.provider,
        rest_url = %config.exchange.base_url(),
        storage = %config.storage.path.display(),
        "Starting coin-tracker"
    );

    let store = Arc::new(open_store(&config.storage)?);
    let exchange = Arc::new(Exchange::from_config(&config.exchange)?);
    let sink = config.storage.enabled.then(|| Arc::clone(&store));
    let service = Arc::new(
        CandleService::new(exchange, sink, config.indicators.clone())
            .with_four_hour_synthesis(config.exchange.synthesize_four_hour),
    );
    let default_count = config.exchange.default_count;

    match command {
        Command::Serve => {
            let app = api::router(AppState {
                service,
                store,
                default_count,
            });
            let listener = tokio::net::TcpListener::bind(&config.server.bind)
                .await
                .with_context(|| format!("failed to bind {}", config.server.bind))?;
            tracing::info!(bind = %config.server.bind, "HTTP API listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                    tracing::info!("Ctrl+C received");
                })
                .await
                .context("HTTP server failed")?;
        }
        Command::Candles {
            market,
            interval,
            count,
        } => {
            let candles = service
                .load_candles(&market, interval, count.unwrap_or(default_count))
                .await?;
            print_candles(&market, &candles);
        }
        Command::Chart {
            market,
            interval,
            count,
        } => {
            let chart = service
                .load_chart(&market, interval, count.unwrap_or(default_count))
                .await?;
            tracing::info!(
                market = %market,
                %interval,
                candles = chart.candles.len(),
                rsi = ?chart.rsi.latest(),
                "Chart built"
            );
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Command::Watch { markets } => {
            let markets = if markets.is_empty() {
                config.polling.normalized_markets()
            } else {
                markets
            };
            watch_prices(service, markets, config.polling.price_refresh_secs).await?;
        }
        Command::Markets { quote } => {
            let markets = service.markets(Some(quote.as_str())).await?;
            for m in &markets {
                println!("{:<12} {} / {}", m.market, m.english_name, m.korean_name);
            }
            tracing::info!(
                venue = service.source().name(),
                quote = %quote,
                shown = markets.len(),
                "Listed markets"
            );
        }
        Command::Coins { favorites_only } => {
            let coins = store.list_coins(favorites_only)?;
            if coins.is_empty() {
                println!("no coins tracked; run `coin-tracker seed` or `coin-tracker add`");
            }
            for coin in &coins {
                print_coin(coin);
            }
        }
        Command::Add {
            symbol,
            market,
            korean_name,
            english_name,
        } => {
            let coin = store.add_coin(&NewCoin::new(&symbol, &market, &korean_name, &english_name))?;
            print_coin(&coin);
        }
        Command::Favorite { symbol } => match store.toggle_favorite(&symbol)? {
            Some(coin) => print_coin(&coin),
            None => anyhow::bail!("coin '{}' is not tracked", symbol),
        },
        Command::Seed => {
            let n = store.seed_default_coins()?;
            println!("seeded {} coins", n);
        }
        Command::Help => {}
    }

    Ok(())
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.with_ansi(false).json().init();
    } else {
        builder.init();
    }
}

fn open_store(cfg: &StorageConfig) -> Result<CandleStore> {
    if !cfg.enabled {
        tracing::info!("Storage disabled; coin registry is in-memory");
        return Ok(CandleStore::open_in_memory()?);
    }
    CandleStore::open(&cfg.path)
        .with_context(|| format!("failed to open {}", cfg.path.display()))
}

async fn watch_prices(service: Arc<Service>, markets: Vec<String>, refresh_secs: u64) -> Result<()> {
    if markets.is_empty() {
        anyhow::bail!("no markets to watch; pass a list or set polling.markets");
    }
    tracing::info!(markets = markets.len(), refresh_secs, "Watching prices");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let markets = Arc::new(markets);
    let handle = spawn_poller(Duration::from_secs(refresh_secs), shutdown_rx, move || {
        let service = Arc::clone(&service);
        let markets = Arc::clone(&markets);
        async move { refresh_prices(&service, &markets).await }
    });

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Ctrl+C received");
    let _ = shutdown_tx.send(true);
    handle.await.context("poller task panicked")?;
    Ok(())
}

async fn refresh_prices(service: &Service, markets: &[String]) {
    let batches = markets.chunks(TICKER_BATCH).map(|batch| service.tickers(batch));
    for result in join_all(batches).await {
        match result {
            Ok(tickers) => {
                for t in tickers {
                    println!(
                        "{:<12} {:>18.4} {:>+8.2}%  vol24h {:.2}",
                        t.market,
                        t.trade_price,
                        t.signed_change_rate * 100.0,
                        t.acc_trade_volume_24h
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Ticker refresh failed"),
        }
    }
}

fn print_candles(market: &str, candles: &[Candle]) {
    println!(
        "{:<20} {:>16} {:>16} {:>16} {:>16} {:>16}",
        market, "open", "high", "low", "close", "volume"
    );
    for c in candles {
        let time = chrono::DateTime::from_timestamp_millis(c.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| c.timestamp.to_string());
        println!(
            "{:<20} {:>16.4} {:>16.4} {:>16.4} {:>16.4} {:>16.4}",
            time, c.open, c.high, c.low, c.close, c.volume
        );
    }
}

fn print_coin(coin: &Coin) {
    println!(
        "{} {:<6} {:<10} {} / {}",
        if coin.is_favorite { "*" } else { " " },
        coin.symbol,
        coin.market,
        coin.english_name,
        coin.korean_name
    );
}
