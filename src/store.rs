use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::model::candle::{Candle, CandleType};
use crate::model::coin::{Coin, NewCoin};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS coins (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        market TEXT NOT NULL,
        korean_name TEXT NOT NULL,
        english_name TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        added_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS price_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        timestamp INTEGER NOT NULL,
        opening_price REAL NOT NULL,
        high_price REAL NOT NULL,
        low_price REAL NOT NULL,
        trade_price REAL NOT NULL,
        candle_acc_trade_volume REAL NOT NULL,
        candle_acc_trade_price REAL,
        candle_type TEXT NOT NULL,
        updated_at_ms INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_coins_symbol ON coins(symbol);
    CREATE INDEX IF NOT EXISTS idx_coins_favorite ON coins(is_favorite);
    CREATE INDEX IF NOT EXISTS idx_price_history_coin_timestamp
        ON price_history(coin_id, timestamp);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_price_history_bar
        ON price_history(coin_id, timestamp, candle_type);
"#;

/// Markets registered by `seed_default_coins`.
pub const DEFAULT_COINS: &[(&str, &str, &str, &str)] = &[
    ("BTC", "KRW-BTC", "비트코인", "Bitcoin"),
    ("ETH", "KRW-ETH", "이더리움", "Ethereum"),
    ("XRP", "KRW-XRP", "리플", "Ripple"),
    ("SOL", "KRW-SOL", "솔라나", "Solana"),
    ("ADA", "KRW-ADA", "에이다", "Cardano"),
    ("DOGE", "KRW-DOGE", "도지코인", "Dogecoin"),
    ("DOT", "KRW-DOT", "폴카닷", "Polkadot"),
    ("AVAX", "KRW-AVAX", "아발란체", "Avalanche"),
    ("LINK", "KRW-LINK", "체인링크", "Chainlink"),
];

/// Receives fetched candles for best-effort persistence.
pub trait CandleSink: Send + Sync + 'static {
    /// Returns the number of rows written; unknown symbols write nothing.
    fn persist_candles(&self, symbol: &str, candles: &[Candle], candle_type: CandleType)
        -> Result<usize>;
}

/// SQLite-backed coin registry and price history. The schema exists once a
/// store has been opened.
pub struct CandleStore {
    conn: Mutex<Connection>,
}

impl CandleStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a coin, or refresh its names if the symbol exists.
    pub fn add_coin(&self, coin: &NewCoin) -> Result<Coin> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO coins (symbol, market, korean_name, english_name, added_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(symbol) DO UPDATE SET
                market = excluded.market,
                korean_name = excluded.korean_name,
                english_name = excluded.english_name
            "#,
            params![
                coin.symbol,
                coin.market,
                coin.korean_name,
                coin.english_name,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        let stored = conn.query_row(
            "SELECT id, symbol, market, korean_name, english_name, is_favorite FROM coins WHERE symbol = ?1",
            [&coin.symbol],
            coin_from_row,
        )?;
        Ok(stored)
    }

    /// Flip the favorite flag; `None` when the symbol is unknown.
    pub fn toggle_favorite(&self, symbol: &str) -> Result<Option<Coin>> {
        let conn = self.conn();
        let coin = conn
            .query_row(
                r#"
                UPDATE coins SET is_favorite = 1 - is_favorite
                WHERE symbol = ?1 OR market = ?1
                RETURNING id, symbol, market, korean_name, english_name, is_favorite
                "#,
                [symbol.trim().to_ascii_uppercase()],
                coin_from_row,
            )
            .optional()?;
        Ok(coin)
    }

    /// Favorites first, then by symbol.
    pub fn list_coins(&self, favorites_only: bool) -> Result<Vec<Coin>> {
        let conn = self.conn();
        let sql = if favorites_only {
            r#"
            SELECT id, symbol, market, korean_name, english_name, is_favorite
            FROM coins WHERE is_favorite = 1
            ORDER BY symbol ASC
            "#
        } else {
            r#"
            SELECT id, symbol, market, korean_name, english_name, is_favorite
            FROM coins
            ORDER BY is_favorite DESC, symbol ASC
            "#
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], coin_from_row)?;

        let mut coins = Vec::new();
        for row in rows {
            coins.push(row?);
        }
        Ok(coins)
    }

    /// Look up by ticker (`BTC`) or market code (`KRW-BTC`).
    pub fn coin_by_symbol(&self, symbol: &str) -> Result<Option<Coin>> {
        let conn = self.conn();
        let coin = conn
            .query_row(
                r#"
                SELECT id, symbol, market, korean_name, english_name, is_favorite
                FROM coins WHERE symbol = ?1 OR market = ?1
                LIMIT 1
                "#,
                [symbol.trim().to_ascii_uppercase()],
                coin_from_row,
            )
            .optional()?;
        Ok(coin)
    }

    /// Upsert candles keyed by `(coin_id, timestamp, candle_type)`.
    pub fn save_price_history(
        &self,
        coin_id: i64,
        candles: &[Candle],
        candle_type: CandleType,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction()?;
        for c in candles {
            tx.execute(
                r#"
                INSERT INTO price_history (
                    coin_id, timestamp, opening_price, high_price, low_price, trade_price,
                    candle_acc_trade_volume, candle_acc_trade_price, candle_type, updated_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(coin_id, timestamp, candle_type) DO UPDATE SET
                    opening_price = excluded.opening_price,
                    high_price = excluded.high_price,
                    low_price = excluded.low_price,
                    trade_price = excluded.trade_price,
                    candle_acc_trade_volume = excluded.candle_acc_trade_volume,
                    candle_acc_trade_price = excluded.candle_acc_trade_price,
                    updated_at_ms = excluded.updated_at_ms
                "#,
                params![
                    coin_id,
                    c.timestamp,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume,
                    c.quote_volume,
                    candle_type.as_str(),
                    now_ms,
                ],
            )?;
        }
        tx.commit()?;
        Ok(candles.len())
    }

    /// The newest `limit` rows, returned oldest first.
    pub fn load_price_history(
        &self,
        coin_id: i64,
        candle_type: CandleType,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT timestamp, opening_price, high_price, low_price, trade_price,
                   candle_acc_trade_volume, candle_acc_trade_price
            FROM price_history
            WHERE coin_id = ?1 AND candle_type = ?2
            ORDER BY timestamp DESC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt.query_map(
            params![coin_id, candle_type.as_str(), limit as i64],
            |row| {
                Ok(Candle {
                    timestamp: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                    quote_volume: row.get(6)?,
                })
            },
        )?;

        let mut candles = Vec::new();
        for row in rows {
            candles.push(row?);
        }
        candles.reverse();
        Ok(candles)
    }

    /// Register [`DEFAULT_COINS`]; returns how many were written.
    pub fn seed_default_coins(&self) -> Result<usize> {
        for (symbol, market, korean_name, english_name) in DEFAULT_COINS {
            self.add_coin(&NewCoin::new(symbol, market, korean_name, english_name))?;
        }
        tracing::info!(count = DEFAULT_COINS.len(), "Seeded default coins");
        Ok(DEFAULT_COINS.len())
    }
}

impl CandleSink for CandleStore {
    fn persist_candles(
        &self,
        symbol: &str,
        candles: &[Candle],
        candle_type: CandleType,
    ) -> Result<usize> {
        let Some(coin) = self.coin_by_symbol(symbol)? else {
            tracing::debug!(symbol, "Skipping persistence for untracked coin");
            return Ok(0);
        };
        self.save_price_history(coin.id, candles, candle_type)
    }
}

fn coin_from_row(row: &Row<'_>) -> rusqlite::Result<Coin> {
    Ok(Coin {
        id: row.get(0)?,
        symbol: row.get(1)?,
        market: row.get(2)?,
        korean_name: row.get(3)?,
        english_name: row.get(4)?,
        is_favorite: row.get::<_, i64>(5)? != 0,
    })
}
