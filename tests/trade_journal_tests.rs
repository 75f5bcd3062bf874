use signal_robot::model::order::{OrderDirection, TradeRecord, TradeStatus};
use signal_robot::order_store::TradeJournal;

fn record(order_id: &str, instrument: &str, opened_at_ms: u64, status: TradeStatus, payout: f64) -> TradeRecord {
    TradeRecord {
        order_id: order_id.to_string(),
        instrument: instrument.to_string(),
        direction: OrderDirection::Call,
        amount: 10.0,
        entry_price: 1.1,
        opened_at_ms,
        expires_at_ms: opened_at_ms + 60_000,
        status,
        payout,
    }
}

#[test]
/// Settling a trade rewrites its status and payout in place instead of adding a row.
fn upsert_overwrites_settlement_fields() {
    let journal = TradeJournal::open_in_memory().unwrap();
    journal
        .upsert_trade(&record("a", "EURUSD", 1_000, TradeStatus::Open, 0.0))
        .unwrap();
    journal
        .upsert_trade(&record("a", "EURUSD", 1_000, TradeStatus::Won, 18.0))
        .unwrap();

    let rows = journal.recent_trades(None, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TradeStatus::Won);
    assert!((rows[0].payout - 18.0).abs() < f64::EPSILON);
    assert_eq!(rows[0].direction, OrderDirection::Call);
    assert_eq!(rows[0].expires_at_ms, 61_000);
}

#[test]
fn recent_trades_filters_by_instrument_and_limits() {
    let journal = TradeJournal::open_in_memory().unwrap();
    for (i, instrument) in ["EURUSD", "GBPUSD", "EURUSD", "EURUSD"].iter().enumerate() {
        journal
            .upsert_trade(&record(
                &format!("t{}", i),
                instrument,
                1_000 * (i as u64 + 1),
                TradeStatus::Open,
                0.0,
            ))
            .unwrap();
    }

    let rows = journal.recent_trades(Some("EURUSD"), 2).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.order_id.as_str()).collect();
    assert_eq!(ids, vec!["t3", "t2"]);

    assert_eq!(journal.recent_trades(None, 10).unwrap().len(), 4);
    assert!(journal.recent_trades(Some("USDJPY"), 10).unwrap().is_empty());
}

#[test]
fn summary_counts_settled_trades_only() {
    let journal = TradeJournal::open_in_memory().unwrap();
    journal
        .upsert_trade(&record("w", "EURUSD", 1, TradeStatus::Won, 18.0))
        .unwrap();
    journal
        .upsert_trade(&record("l", "EURUSD", 2, TradeStatus::Lost, 0.0))
        .unwrap();
    journal
        .upsert_trade(&record("r", "EURUSD", 3, TradeStatus::Refunded, 10.0))
        .unwrap();
    journal
        .upsert_trade(&record("o", "EURUSD", 4, TradeStatus::Open, 0.0))
        .unwrap();

    let summary = journal.summary(Some("EURUSD")).unwrap();
    assert_eq!(summary.trade_count, 3);
    assert_eq!(summary.win_count, 1);
    assert_eq!(summary.lose_count, 1);
    assert!((summary.net_profit + 2.0).abs() < 1e-9);
    assert!((summary.win_rate_percent() - 50.0).abs() < 1e-9);
}

#[test]
fn empty_journal_summary_is_zero() {
    let journal = TradeJournal::open_in_memory().unwrap();
    let summary = journal.summary(None).unwrap();
    assert_eq!(summary.trade_count, 0);
    assert!(summary.win_rate_percent().abs() < f64::EPSILON);
}

#[test]
fn open_creates_parent_directory() {
    let dir = std::env::temp_dir().join(format!("signal-robot-journal-{}", uuid::Uuid::new_v4()));
    let path = dir.join("nested").join("journal.sqlite");
    {
        let journal = TradeJournal::open(&path).unwrap();
        journal
            .upsert_trade(&record("x", "EURUSD", 1, TradeStatus::Open, 0.0))
            .unwrap();
    }
    let reopened = TradeJournal::open(&path).unwrap();
    assert_eq!(reopened.recent_trades(None, 10).unwrap().len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}
