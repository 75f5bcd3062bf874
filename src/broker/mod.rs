//! Collaborator interfaces the robot consumes.
//!
//! Connecting, authenticating and persisting belong to whoever implements these.
//! The robot only reads candles and balances, and submits orders.

pub mod paper;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::candle::Candle;
use crate::model::order::{OrderReceipt, TradeOrder, TradeRecord};

/// Live broker session. Only consulted to gate whether a loop may start.
pub trait BrokerSession: Send + Sync {
    fn is_connected(&self) -> bool;
}

#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `count` candles of `timeframe_secs` ending at or before `as_of`, oldest first.
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe_secs: u64,
        count: usize,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Account balance in account currency.
    async fn get_balance(&self) -> Result<f64>;
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit_order(&self, order: &TradeOrder) -> Result<OrderReceipt>;
}

#[async_trait]
pub trait TradeHistorySource: Send + Sync {
    /// Most recent `n` trades, newest first.
    async fn get_recent_trades(&self, n: usize) -> Result<Vec<TradeRecord>>;
}

/// Handles to every collaborator a trading loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub session: Arc<dyn BrokerSession>,
    pub candles: Arc<dyn CandleSource>,
    pub balance: Arc<dyn BalanceSource>,
    pub orders: Arc<dyn OrderSink>,
}

impl Collaborators {
    /// Use one broker for every capability.
    pub fn from_broker<B>(broker: Arc<B>) -> Self
    where
        B: BrokerSession + CandleSource + BalanceSource + OrderSink + 'static,
    {
        Self {
            session: broker.clone(),
            candles: broker.clone(),
            balance: broker.clone(),
            orders: broker,
        }
    }
}
