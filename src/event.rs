use crate::model::order::{OrderReceipt, TradeOrder};
use crate::model::session::AccountMode;
use crate::strategy::sma_rsi::AnalysisReport;
use crate::trading_loop::{HaltReason, LoopState};

/// Operator-facing progress of a trading session.
#[derive(Debug, Clone)]
pub enum RobotEvent {
    SessionStarted {
        instrument: String,
        account_mode: AccountMode,
        baseline_balance: f64,
    },
    StateChanged(LoopState),
    BalanceUpdate {
        balance: f64,
        drawdown_pct: Option<f64>,
        /// Share of the stop-loss budget consumed, `[0, 1]`.
        risk_utilization: f64,
    },
    Analysis(AnalysisReport),
    Waiting {
        reason: String,
    },
    OrderSubmitted {
        order: TradeOrder,
        receipt: OrderReceipt,
    },
    Halted(HaltReason),
}
