use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    #[serde(alias = "PRACTICE")]
    Practice,
    #[serde(alias = "REAL")]
    Real,
}

impl fmt::Display for AccountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountMode::Practice => write!(f, "PRACTICE"),
            AccountMode::Real => write!(f, "REAL"),
        }
    }
}

/// State of one trading session. Owned by a single loop run and dropped when it halts.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub instrument: String,
    pub account_mode: AccountMode,
    pub investment_amount: f64,
    pub stop_loss_percent: f64,
    baseline_balance: f64,
    pub current_balance: f64,
    pub started_at_ms: u64,
    pub ticks: u64,
    pub orders_submitted: u32,
    pub last_order_tick: Option<u64>,
}

impl Session {
    pub fn new(
        instrument: impl Into<String>,
        account_mode: AccountMode,
        investment_amount: f64,
        stop_loss_percent: f64,
        baseline_balance: f64,
        started_at_ms: u64,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            account_mode,
            investment_amount,
            stop_loss_percent,
            baseline_balance,
            current_balance: baseline_balance,
            started_at_ms,
            ticks: 0,
            orders_submitted: 0,
            last_order_tick: None,
        }
    }

    /// Balance captured at session start. Fixed for the session's lifetime.
    pub fn baseline_balance(&self) -> f64 {
        self.baseline_balance
    }

    pub fn pnl(&self) -> f64 {
        self.current_balance - self.baseline_balance
    }

    /// Ticks since the last submitted order, `None` before the first order.
    pub fn ticks_since_last_order(&self) -> Option<u64> {
        self.last_order_tick
            .map(|tick| self.ticks.saturating_sub(tick))
    }
}
