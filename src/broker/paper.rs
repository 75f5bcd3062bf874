//! Practice-account broker.
//!
//! Keeps a virtual balance and settles fixed-expiry options against the close
//! a real candle feed reports at each option's expiry. A winning option
//! returns the stake plus `payout_rate` of it. A losing one returns nothing
//! and an unchanged price refunds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{BalanceSource, BrokerSession, CandleSource, OrderSink, TradeHistorySource};
use crate::model::candle::Candle;
use crate::model::order::{OrderDirection, OrderReceipt, TradeOrder, TradeRecord, TradeStatus};
use crate::order_store::TradeJournal;

/// Timeframe used when the broker needs a single mark price.
const MARK_TIMEFRAME_SECS: u64 = 60;

struct PaperState {
    balance: f64,
    trades: Vec<TradeRecord>,
    journal: Option<TradeJournal>,
}

pub struct PaperBroker {
    feed: Arc<dyn CandleSource>,
    payout_rate: f64,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(feed: Arc<dyn CandleSource>, starting_balance: f64, payout_rate: f64) -> Self {
        Self {
            feed,
            payout_rate: payout_rate.max(0.0),
            state: Mutex::new(PaperState {
                balance: starting_balance,
                trades: Vec::new(),
                journal: None,
            }),
        }
    }

    /// Record every opened and settled trade to `journal`.
    pub fn with_journal(self, journal: TradeJournal) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.journal = Some(journal);
        }
        self
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, PaperState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("paper broker state lock poisoned"))
    }

    async fn mark_price(&self, instrument: &str, as_of: DateTime<Utc>) -> Result<f64> {
        let candles = self
            .feed
            .get_candles(instrument, MARK_TIMEFRAME_SECS, 1, as_of)
            .await
            .with_context(|| format!("failed to mark {}", instrument))?;
        candles
            .last()
            .map(|c| c.close)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| anyhow!("no mark price for {}", instrument))
    }

    /// Settle every open trade whose expiry is at or before `now_ms`.
    ///
    /// Each trade is marked at its own expiry, not at `now_ms`, so a late
    /// settlement sees the same price an on-time one would.
    pub async fn settle_due_at(&self, now_ms: u64) -> Result<usize> {
        let due: Vec<(String, u64)> = {
            let state = self.lock_state()?;
            let mut out: Vec<(String, u64)> = Vec::new();
            for t in &state.trades {
                let key = (t.instrument.clone(), t.expires_at_ms);
                if t.status == TradeStatus::Open && t.expires_at_ms <= now_ms && !out.contains(&key) {
                    out.push(key);
                }
            }
            out
        };
        if due.is_empty() {
            return Ok(0);
        }

        let mut marks = HashMap::new();
        for (instrument, expires_at_ms) in due {
            let price = self.mark_price(&instrument, utc_from_ms(expires_at_ms)).await?;
            marks.insert((instrument, expires_at_ms), price);
        }

        let mut state = self.lock_state()?;
        let PaperState {
            balance,
            trades,
            journal,
        } = &mut *state;
        let mut settled = 0;
        for trade in trades.iter_mut() {
            if trade.status != TradeStatus::Open || trade.expires_at_ms > now_ms {
                continue;
            }
            let Some(&mark) = marks.get(&(trade.instrument.clone(), trade.expires_at_ms)) else {
                continue;
            };
            let (status, payout) = settle(trade, mark, self.payout_rate);
            trade.status = status;
            trade.payout = payout;
            *balance += payout;
            settled += 1;
            tracing::info!(
                order_id = %trade.order_id,
                instrument = %trade.instrument,
                direction = %trade.direction,
                entry_price = trade.entry_price,
                mark,
                status = %status,
                payout,
                "Practice option settled"
            );
            if let Some(journal) = journal.as_ref() {
                if let Err(e) = journal.upsert_trade(trade) {
                    tracing::warn!(error = %e, "Failed to journal settled trade");
                }
            }
        }
        Ok(settled)
    }

    /// Latest expiry among trades still open.
    pub fn last_open_expiry_ms(&self) -> Option<u64> {
        let state = self.lock_state().ok()?;
        state
            .trades
            .iter()
            .filter(|t| t.status == TradeStatus::Open)
            .map(|t| t.expires_at_ms)
            .max()
    }

    /// Wait until every open trade has expired, then settle them all.
    ///
    /// Called when a session ends so no journaled trade is left open.
    pub async fn settle_remaining(&self) -> Result<usize> {
        let Some(last_expiry_ms) = self.last_open_expiry_ms() else {
            return Ok(0);
        };
        let now_ms = now_ms();
        if last_expiry_ms > now_ms {
            tokio::time::sleep(Duration::from_millis(last_expiry_ms - now_ms)).await;
        }
        self.settle_due_at(last_expiry_ms.max(now_ms)).await
    }

    pub fn open_trade_count(&self) -> usize {
        self.lock_state()
            .map(|s| {
                s.trades
                    .iter()
                    .filter(|t| t.status == TradeStatus::Open)
                    .count()
            })
            .unwrap_or(0)
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn utc_from_ms(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

fn settle(trade: &TradeRecord, mark: f64, payout_rate: f64) -> (TradeStatus, f64) {
    let won = match trade.direction {
        OrderDirection::Call => mark > trade.entry_price,
        OrderDirection::Put => mark < trade.entry_price,
    };
    if mark == trade.entry_price {
        (TradeStatus::Refunded, trade.amount)
    } else if won {
        (TradeStatus::Won, trade.amount * (1.0 + payout_rate))
    } else {
        (TradeStatus::Lost, 0.0)
    }
}

impl BrokerSession for PaperBroker {
    fn is_connected(&self) -> bool {
        true
    }
}

#[async_trait]
impl CandleSource for PaperBroker {
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe_secs: u64,
        count: usize,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        self.feed
            .get_candles(instrument, timeframe_secs, count, as_of)
            .await
    }
}

#[async_trait]
impl BalanceSource for PaperBroker {
    async fn get_balance(&self) -> Result<f64> {
        self.settle_due_at(now_ms()).await?;
        Ok(self.lock_state()?.balance)
    }
}

#[async_trait]
impl OrderSink for PaperBroker {
    async fn submit_order(&self, order: &TradeOrder) -> Result<OrderReceipt> {
        if !(order.amount().is_finite() && order.amount() > 0.0) {
            bail!("order amount must be > 0 (got {})", order.amount());
        }
        let now = Utc::now();
        let entry_price = self.mark_price(order.instrument(), now).await?;
        let opened_at_ms = now.timestamp_millis().max(0) as u64;

        let mut state = self.lock_state()?;
        if state.balance < order.amount() {
            bail!(
                "insufficient practice balance: need {:.2}, have {:.2}",
                order.amount(),
                state.balance
            );
        }
        let trade = TradeRecord {
            order_id: format!("paper-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            instrument: order.instrument().to_string(),
            direction: order.direction(),
            amount: order.amount(),
            entry_price,
            opened_at_ms,
            expires_at_ms: opened_at_ms + u64::from(order.expiry_minutes()) * 60_000,
            status: TradeStatus::Open,
            payout: 0.0,
        };
        state.balance -= trade.amount;
        if let Some(journal) = state.journal.as_ref() {
            if let Err(e) = journal.upsert_trade(&trade) {
                tracing::warn!(error = %e, "Failed to journal opened trade");
            }
        }
        tracing::info!(
            order_id = %trade.order_id,
            instrument = %trade.instrument,
            direction = %trade.direction,
            amount = trade.amount,
            entry_price,
            balance = state.balance,
            "Practice option opened"
        );
        let receipt = OrderReceipt {
            order_id: trade.order_id.clone(),
            accepted_at_ms: opened_at_ms,
        };
        state.trades.push(trade);
        Ok(receipt)
    }
}

#[async_trait]
impl TradeHistorySource for PaperBroker {
    async fn get_recent_trades(&self, n: usize) -> Result<Vec<TradeRecord>> {
        self.settle_due_at(now_ms()).await?;
        let state = self.lock_state()?;
        Ok(state.trades.iter().rev().take(n).cloned().collect())
    }
}
