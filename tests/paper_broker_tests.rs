use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use signal_robot::broker::paper::PaperBroker;
use signal_robot::broker::{BalanceSource, BrokerSession, CandleSource, OrderSink, TradeHistorySource};
use signal_robot::model::candle::Candle;
use signal_robot::model::order::{OrderDirection, TradeOrder, TradeStatus};
use signal_robot::order_store::TradeJournal;

/// Feed whose latest close is set by the test.
struct MovableFeed {
    price: Mutex<f64>,
}

impl MovableFeed {
    fn at(price: f64) -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(price),
        })
    }

    fn move_to(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }
}

#[async_trait]
impl CandleSource for MovableFeed {
    async fn get_candles(
        &self,
        _instrument: &str,
        _timeframe_secs: u64,
        _count: usize,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>> {
        let price = *self.price.lock().unwrap();
        Ok(vec![Candle::from_close(as_of.timestamp(), price)])
    }
}

fn after_expiry() -> u64 {
    Utc::now().timestamp_millis() as u64 + 120_000
}

fn call(amount: f64) -> TradeOrder {
    TradeOrder::new(OrderDirection::Call, amount, "EURUSDT", 1)
}

fn put(amount: f64) -> TradeOrder {
    TradeOrder::new(OrderDirection::Put, amount, "EURUSDT", 1)
}

#[tokio::test]
async fn submit_reserves_the_stake() {
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed, 1000.0, 0.8);

    let receipt = broker.submit_order(&call(10.0)).await.unwrap();
    assert!(receipt.order_id.starts_with("paper-"));
    assert!(broker.is_connected());
    assert_eq!(broker.open_trade_count(), 1);
    assert!((broker.get_balance().await.unwrap() - 990.0).abs() < 1e-9);
}

#[tokio::test]
async fn winning_call_pays_stake_plus_payout() {
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed.clone(), 1000.0, 0.8);
    broker.submit_order(&call(10.0)).await.unwrap();

    feed.move_to(1.2);
    assert_eq!(broker.settle_due_at(after_expiry()).await.unwrap(), 1);
    assert_eq!(broker.open_trade_count(), 0);
    assert!((broker.get_balance().await.unwrap() - 1008.0).abs() < 1e-9);

    let trades = broker.get_recent_trades(5).await.unwrap();
    assert_eq!(trades[0].status, TradeStatus::Won);
    assert!((trades[0].profit() - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn losing_put_forfeits_stake() {
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed.clone(), 1000.0, 0.8);
    broker.submit_order(&put(10.0)).await.unwrap();

    feed.move_to(1.2);
    broker.settle_due_at(after_expiry()).await.unwrap();
    assert!((broker.get_balance().await.unwrap() - 990.0).abs() < 1e-9);
    let trades = broker.get_recent_trades(1).await.unwrap();
    assert_eq!(trades[0].status, TradeStatus::Lost);
}

#[tokio::test]
async fn unchanged_price_refunds() {
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed, 1000.0, 0.8);
    broker.submit_order(&call(10.0)).await.unwrap();

    broker.settle_due_at(after_expiry()).await.unwrap();
    assert!((broker.get_balance().await.unwrap() - 1000.0).abs() < 1e-9);
    let trades = broker.get_recent_trades(1).await.unwrap();
    assert_eq!(trades[0].status, TradeStatus::Refunded);
}

#[tokio::test]
async fn trades_are_not_settled_before_expiry() {
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed, 1000.0, 0.8);
    broker.submit_order(&call(10.0)).await.unwrap();

    let now_ms = Utc::now().timestamp_millis() as u64;
    assert_eq!(broker.settle_due_at(now_ms).await.unwrap(), 0);
    assert_eq!(broker.open_trade_count(), 1);
}

#[tokio::test]
async fn rejects_stake_above_balance() {
    let broker = PaperBroker::new(MovableFeed::at(1.1), 5.0, 0.8);
    let err = broker.submit_order(&call(10.0)).await.unwrap_err();
    assert!(err.to_string().contains("insufficient practice balance"));
    assert_eq!(broker.open_trade_count(), 0);
}

#[tokio::test]
async fn rejects_non_positive_stake() {
    let broker = PaperBroker::new(MovableFeed::at(1.1), 1000.0, 0.8);
    assert!(broker.submit_order(&call(0.0)).await.is_err());
}

#[tokio::test]
async fn recent_trades_are_newest_first() {
    let broker = PaperBroker::new(MovableFeed::at(1.1), 1000.0, 0.8);
    let first = broker.submit_order(&call(1.0)).await.unwrap();
    let second = broker.submit_order(&put(2.0)).await.unwrap();

    let trades = broker.get_recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].order_id, second.order_id);
    assert_eq!(trades[1].order_id, first.order_id);
}

#[tokio::test]
async fn journal_records_open_and_settled_trades() {
    let path = std::env::temp_dir().join(format!(
        "signal-robot-paper-{}.sqlite",
        uuid::Uuid::new_v4()
    ));
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed.clone(), 1000.0, 0.8)
        .with_journal(TradeJournal::open(&path).unwrap());
    let receipt = broker.submit_order(&call(10.0)).await.unwrap();

    let reader = TradeJournal::open(&path).unwrap();
    let rows = reader.recent_trades(Some("EURUSDT"), 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].order_id, receipt.order_id);
    assert_eq!(rows[0].status, TradeStatus::Open);

    feed.move_to(1.3);
    broker.settle_due_at(after_expiry()).await.unwrap();
    let rows = reader.recent_trades(Some("EURUSDT"), 10).unwrap();
    assert_eq!(rows[0].status, TradeStatus::Won);

    let _ = std::fs::remove_file(&path);
}

/// Feed whose close depends on the requested time: 100 at entry, 101 one
/// minute later, 99 from then on.
struct TimedFeed {
    opened_ms: i64,
}

#[async_trait]
impl CandleSource for TimedFeed {
    async fn get_candles(
        &self,
        _instrument: &str,
        _timeframe_secs: u64,
        _count: usize,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>> {
        let elapsed = as_of.timestamp_millis() - self.opened_ms;
        let price = if elapsed < 30_000 {
            100.0
        } else if elapsed < 90_000 {
            101.0
        } else {
            99.0
        };
        Ok(vec![Candle::from_close(as_of.timestamp(), price)])
    }
}

#[tokio::test]
async fn late_settlement_uses_the_price_at_expiry() {
    let feed = Arc::new(TimedFeed {
        opened_ms: Utc::now().timestamp_millis(),
    });
    let broker = PaperBroker::new(feed, 1000.0, 0.8);
    broker.submit_order(&call(10.0)).await.unwrap();

    // Settling five minutes late: the price has since fallen below entry.
    let late = Utc::now().timestamp_millis() as u64 + 300_000;
    assert_eq!(broker.settle_due_at(late).await.unwrap(), 1);
    let trades = broker.get_recent_trades(1).await.unwrap();
    assert_eq!(trades[0].status, TradeStatus::Won);
    assert!((broker.get_balance().await.unwrap() - 1008.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn settle_remaining_closes_every_open_trade() {
    let path = std::env::temp_dir().join(format!(
        "signal-robot-paper-{}.sqlite",
        uuid::Uuid::new_v4()
    ));
    let feed = MovableFeed::at(1.1);
    let broker = PaperBroker::new(feed.clone(), 1000.0, 0.8)
        .with_journal(TradeJournal::open(&path).unwrap());
    broker.submit_order(&call(10.0)).await.unwrap();
    broker.submit_order(&put(5.0)).await.unwrap();
    assert!(broker.last_open_expiry_ms().is_some());

    feed.move_to(1.2);
    assert_eq!(broker.settle_remaining().await.unwrap(), 2);
    assert_eq!(broker.open_trade_count(), 0);
    assert_eq!(broker.last_open_expiry_ms(), None);

    let reader = TradeJournal::open(&path).unwrap();
    let rows = reader.recent_trades(Some("EURUSDT"), 10).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status != TradeStatus::Open));

    assert_eq!(broker.settle_remaining().await.unwrap(), 0);
    let _ = std::fs::remove_file(&path);
}
