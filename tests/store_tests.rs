use coin_tracker::model::candle::{Candle, CandleType};
use coin_tracker::model::coin::NewCoin;
use coin_tracker::store::{CandleSink, CandleStore};

fn temp_db(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("coin_tracker_store_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("nested").join("coins.sqlite")
}

#[test]
/// Rows written through one handle are visible after reopening the file,
/// and reopening does not recreate or clear the schema.
fn reopen_keeps_coins_and_history() {
    let path = temp_db("reopen");
    {
        let store = CandleStore::open(&path).expect("open should create parent dirs");
        let coin = store
            .add_coin(&NewCoin::new("ETH", "KRW-ETH", "이더리움", "Ethereum"))
            .unwrap();
        store.toggle_favorite("ETH").unwrap();
        let bars: Vec<Candle> = (0..3)
            .map(|i| {
                Candle::new(i * 86_400_000, 10.0, 12.0, 9.0, 11.0, 5.0).with_quote_volume(55.0)
            })
            .collect();
        store
            .save_price_history(coin.id, &bars, CandleType::Day)
            .unwrap();
    }

    let store = CandleStore::open(&path).unwrap();
    let coin = store.coin_by_symbol("krw-eth").unwrap().expect("coin persisted");
    assert!(coin.is_favorite);
    let history = store.load_price_history(coin.id, CandleType::Day, 100).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].timestamp, 0);
    assert_eq!(history[2].quote_volume, Some(55.0));

    let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
}

#[test]
fn candle_types_are_kept_apart() {
    let store = CandleStore::open_in_memory().unwrap();
    store.seed_default_coins().unwrap();
    let bar = [Candle::new(1_700_000_000_000, 1.0, 2.0, 0.5, 1.5, 3.0)];
    assert_eq!(store.persist_candles("BTC", &bar, CandleType::Minute).unwrap(), 1);
    assert_eq!(store.persist_candles("KRW-BTC", &bar, CandleType::Day).unwrap(), 1);

    let btc = store.coin_by_symbol("BTC").unwrap().unwrap();
    assert_eq!(store.load_price_history(btc.id, CandleType::Minute, 10).unwrap().len(), 1);
    assert_eq!(store.load_price_history(btc.id, CandleType::Day, 10).unwrap().len(), 1);
    assert!(store
        .load_price_history(btc.id, CandleType::Week, 10)
        .unwrap()
        .is_empty());
}

#[test]
fn seeding_twice_does_not_duplicate() {
    let store = CandleStore::open_in_memory().unwrap();
    let first = store.seed_default_coins().unwrap();
    store.seed_default_coins().unwrap();
    assert_eq!(store.list_coins(false).unwrap().len(), first);
}
