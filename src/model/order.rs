use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Call,
    Put,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Call => "CALL",
            OrderDirection::Put => "PUT",
        }
    }

    pub fn from_str_lossy(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" => Some(OrderDirection::Call),
            "PUT" => Some(OrderDirection::Put),
            _ => None,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A fixed-expiry option order. Built once per triggering tick and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    direction: OrderDirection,
    amount: f64,
    instrument: String,
    expiry_minutes: u32,
}

impl TradeOrder {
    pub fn new(
        direction: OrderDirection,
        amount: f64,
        instrument: impl Into<String>,
        expiry_minutes: u32,
    ) -> Self {
        Self {
            direction,
            amount,
            instrument: instrument.into(),
            expiry_minutes,
        }
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn expiry_minutes(&self) -> u32 {
        self.expiry_minutes
    }
}

/// Broker acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub accepted_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Won,
    Lost,
    Refunded,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Won => "WON",
            TradeStatus::Lost => "LOST",
            TradeStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "WON" => TradeStatus::Won,
            "LOST" => TradeStatus::Lost,
            "REFUNDED" => TradeStatus::Refunded,
            _ => TradeStatus::Open,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, TradeStatus::Open)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A trade as reported back for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub order_id: String,
    pub instrument: String,
    pub direction: OrderDirection,
    pub amount: f64,
    pub entry_price: f64,
    pub opened_at_ms: u64,
    pub expires_at_ms: u64,
    pub status: TradeStatus,
    /// Amount credited back at settlement (0 while open or lost).
    pub payout: f64,
}

impl TradeRecord {
    pub fn profit(&self) -> f64 {
        if self.status.is_settled() {
            self.payout - self.amount
        } else {
            0.0
        }
    }
}
