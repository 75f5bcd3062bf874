//! Cancellable poll → analyze → act loop for one trading session.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, watch};

use crate::broker::Collaborators;
use crate::config::Config;
use crate::error::RobotError;
use crate::event::RobotEvent;
use crate::manual::analyze_market;
use crate::model::order::{OrderReceipt, TradeOrder};
use crate::model::session::{AccountMode, Session};
use crate::risk_module::RiskMonitor;
use crate::strategy::sma_rsi::{AnalysisReport, SmaRsiStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Polling,
    Trading,
    HaltedRisk,
    HaltedError,
    HaltedCancelled,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoopState::HaltedRisk | LoopState::HaltedError | LoopState::HaltedCancelled
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Starting => "STARTING",
            LoopState::Polling => "POLLING",
            LoopState::Trading => "TRADING",
            LoopState::HaltedRisk => "HALTED_RISK",
            LoopState::HaltedError => "HALTED_ERROR",
            LoopState::HaltedCancelled => "HALTED_CANCELLED",
        };
        f.write_str(s)
    }
}

/// Why a session ended. Risk breaches are controlled stops, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum HaltReason {
    RiskBreach {
        balance: f64,
        /// `None` when the baseline could not anchor a percentage.
        drawdown_pct: Option<f64>,
    },
    Error(RobotError),
    Cancelled,
}

impl HaltReason {
    pub fn state(&self) -> LoopState {
        match self {
            HaltReason::RiskBreach { .. } => LoopState::HaltedRisk,
            HaltReason::Error(_) => LoopState::HaltedError,
            HaltReason::Cancelled => LoopState::HaltedCancelled,
        }
    }

    /// Stable machine-readable code for status displays.
    pub fn reason_code(&self) -> &'static str {
        match self {
            HaltReason::RiskBreach { .. } => "risk.drawdown_breach",
            HaltReason::Error(RobotError::DataUnavailable { .. }) => "data.unavailable",
            HaltReason::Error(RobotError::OrderSubmission(_)) => "order.submit_failed",
            HaltReason::Error(_) => "error.unknown",
            HaltReason::Cancelled => "session.cancelled",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::RiskBreach {
                balance,
                drawdown_pct: Some(pct),
            } => write!(f, "stop-loss reached: balance {:.2}, drawdown {:.2}%", balance, pct),
            HaltReason::RiskBreach { balance, .. } => {
                write!(f, "stop-loss reached: balance {:.2}, no usable baseline", balance)
            }
            HaltReason::Error(e) => write!(f, "{}", e),
            HaltReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No analysis this tick (short or unavailable candle window); retried next tick.
    Skipped(RobotError),
    NoSignal(AnalysisReport),
    /// Signal suppressed because an order was submitted within the cooldown.
    Cooldown(AnalysisReport),
    Traded {
        report: AnalysisReport,
        order: TradeOrder,
        receipt: OrderReceipt,
    },
    Halted(HaltReason),
}

/// Session parameters the loop runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub instrument: String,
    pub account_mode: AccountMode,
    pub investment_amount: f64,
    pub stop_loss_percent: f64,
    pub expiry_minutes: u32,
    pub poll_interval: Duration,
    pub timeframe_secs: u64,
    pub candle_count: usize,
    pub cooldown_ticks: u64,
}

impl LoopSettings {
    /// Practice session with one-minute candles, one-minute expiry and a 60 s poll.
    pub fn new(
        instrument: impl Into<String>,
        investment_amount: f64,
        stop_loss_percent: f64,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            account_mode: AccountMode::Practice,
            investment_amount,
            stop_loss_percent,
            expiry_minutes: 1,
            poll_interval: Duration::from_secs(60),
            timeframe_secs: 60,
            candle_count: 100,
            cooldown_ticks: 0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let robot = &config.robot;
        Ok(Self {
            instrument: robot.instrument.clone(),
            account_mode: robot.account_mode,
            investment_amount: robot.investment_amount,
            stop_loss_percent: config.risk.stop_loss_percent,
            expiry_minutes: robot.expiry_minutes,
            poll_interval: Duration::from_secs(robot.poll_interval_secs),
            timeframe_secs: robot
                .candle_interval_secs()
                .context("robot.candle_interval is invalid")?,
            candle_count: robot.candle_count,
            cooldown_ticks: robot.cooldown_ticks,
        })
    }
}

/// Final state of a session that got past start-up.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub halt: HaltReason,
    pub session: Session,
    pub risk_utilization: f64,
}

impl SessionReport {
    pub fn state(&self) -> LoopState {
        self.halt.state()
    }
}

pub struct TradingLoop {
    settings: LoopSettings,
    strategy: SmaRsiStrategy,
    collaborators: Collaborators,
    events: Option<mpsc::Sender<RobotEvent>>,
    state: LoopState,
    halted: Option<HaltReason>,
}

impl TradingLoop {
    pub fn new(
        settings: LoopSettings,
        strategy: SmaRsiStrategy,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            settings,
            strategy,
            collaborators,
            events: None,
            state: LoopState::Starting,
            halted: None,
        }
    }

    /// Publish progress to `tx`. Send failures are ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<RobotEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    async fn emit(&self, event: RobotEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn transition(&mut self, next: LoopState) {
        if self.state == next {
            return;
        }
        tracing::info!(from = %self.state, to = %next, "Loop state change");
        self.state = next;
        self.emit(RobotEvent::StateChanged(next)).await;
    }

    /// Why the current session halted, if it has.
    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.halted.as_ref()
    }

    /// Enter the halted state for `reason`. Every later tick returns it unchanged.
    async fn halt(&mut self, reason: HaltReason) -> TickOutcome {
        self.transition(reason.state()).await;
        self.halted = Some(reason.clone());
        TickOutcome::Halted(reason)
    }

    /// Check the broker session and capture the baseline balance.
    ///
    /// This is the only way out of a halted state: it begins a new session.
    pub async fn start(&mut self) -> Result<(Session, RiskMonitor), RobotError> {
        self.state = LoopState::Starting;
        self.halted = None;
        if !self.collaborators.session.is_connected() {
            tracing::error!("Broker session not connected; refusing to start");
            self.transition(LoopState::HaltedError).await;
            return Err(RobotError::NotConnected);
        }

        let baseline = match self.collaborators.balance.get_balance().await {
            Ok(b) => b,
            Err(e) => {
                let err = RobotError::unavailable("get_balance", &e);
                tracing::error!(error = %err, "Failed to capture baseline balance");
                self.transition(LoopState::HaltedError).await;
                return Err(err);
            }
        };

        let s = &self.settings;
        let session = Session::new(
            s.instrument.clone(),
            s.account_mode,
            s.investment_amount,
            s.stop_loss_percent,
            baseline,
            Utc::now().timestamp_millis().max(0) as u64,
        );
        let risk = RiskMonitor::new(baseline, s.stop_loss_percent);
        tracing::info!(
            instrument = %session.instrument,
            account_mode = %session.account_mode,
            baseline_balance = baseline,
            stop_loss_percent = s.stop_loss_percent,
            "Session started"
        );
        self.emit(RobotEvent::SessionStarted {
            instrument: session.instrument.clone(),
            account_mode: session.account_mode,
            baseline_balance: baseline,
        })
        .await;
        self.transition(LoopState::Polling).await;
        Ok((session, risk))
    }

    /// One poll → risk check → analyze → act cycle. Submits at most one order.
    ///
    /// Once a tick has halted, further ticks do nothing and return the same reason.
    pub async fn tick(&mut self, session: &mut Session, risk: &RiskMonitor) -> TickOutcome {
        if let Some(reason) = &self.halted {
            return TickOutcome::Halted(reason.clone());
        }
        session.ticks += 1;

        let balance = match self.collaborators.balance.get_balance().await {
            Ok(b) => b,
            Err(e) => {
                let err = RobotError::unavailable("get_balance", &e);
                tracing::error!(tick = session.ticks, error = %err, "Balance read failed");
                return self.halt(HaltReason::Error(err)).await;
            }
        };
        session.current_balance = balance;
        let drawdown_pct = risk.drawdown_pct(balance);
        self.emit(RobotEvent::BalanceUpdate {
            balance,
            drawdown_pct,
            risk_utilization: risk.utilization(balance),
        })
        .await;

        if risk.check_drawdown(balance).is_breached() {
            tracing::error!(
                tick = session.ticks,
                balance,
                baseline_balance = risk.baseline_balance(),
                drawdown_pct = ?drawdown_pct,
                stop_loss_percent = risk.stop_loss_percent(),
                "Stop-loss reached, halting"
            );
            return self
                .halt(HaltReason::RiskBreach {
                    balance,
                    drawdown_pct,
                })
                .await;
        }

        let report = match analyze_market(
            self.collaborators.candles.as_ref(),
            &self.settings,
            &self.strategy,
            Utc::now(),
        )
        .await
        {
            Ok(r) => r,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(tick = session.ticks, error = %e, "Skipping tick, no usable candle window");
                self.emit(RobotEvent::Waiting {
                    reason: e.to_string(),
                })
                .await;
                return TickOutcome::Skipped(e);
            }
            Err(e) => {
                tracing::error!(tick = session.ticks, error = %e, "Analysis failed, halting");
                return self.halt(HaltReason::Error(e)).await;
            }
        };
        tracing::debug!(
            tick = session.ticks,
            last_close = report.last_close,
            sma_short = report.sma_short,
            sma_long = report.sma_long,
            rsi = report.rsi,
            signal = %report.signal,
            "Analysis"
        );
        self.emit(RobotEvent::Analysis(report)).await;

        let Some(direction) = report.signal.direction() else {
            self.emit(RobotEvent::Waiting {
                reason: "Waiting for an opportunity...".to_string(),
            })
            .await;
            return TickOutcome::NoSignal(report);
        };

        if self.settings.cooldown_ticks > 0 {
            if let Some(since) = session.ticks_since_last_order() {
                if since <= self.settings.cooldown_ticks {
                    tracing::info!(
                        tick = session.ticks,
                        signal = %report.signal,
                        ticks_since_last_order = since,
                        "Signal suppressed by cooldown"
                    );
                    self.emit(RobotEvent::Waiting {
                        reason: format!("{} signal suppressed by cooldown", report.signal),
                    })
                    .await;
                    return TickOutcome::Cooldown(report);
                }
            }
        }

        self.transition(LoopState::Trading).await;
        let order = TradeOrder::new(
            direction,
            session.investment_amount,
            session.instrument.clone(),
            self.settings.expiry_minutes,
        );
        match self.collaborators.orders.submit_order(&order).await {
            Ok(receipt) => {
                session.orders_submitted += 1;
                session.last_order_tick = Some(session.ticks);
                tracing::info!(
                    tick = session.ticks,
                    order_id = %receipt.order_id,
                    direction = %order.direction(),
                    amount = order.amount(),
                    instrument = %order.instrument(),
                    "Order submitted"
                );
                self.emit(RobotEvent::OrderSubmitted {
                    order: order.clone(),
                    receipt: receipt.clone(),
                })
                .await;
                self.transition(LoopState::Polling).await;
                TickOutcome::Traded {
                    report,
                    order,
                    receipt,
                }
            }
            Err(e) => {
                let err = RobotError::OrderSubmission(format!("{:#}", e));
                tracing::error!(tick = session.ticks, error = %err, "Order submission failed, halting");
                self.halt(HaltReason::Error(err)).await
            }
        }
    }

    /// Run ticks until a risk breach, an error, or `cancel` turns `true`.
    ///
    /// Returns `Err` only when the session could not start.
    pub async fn run(
        &mut self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SessionReport, RobotError> {
        let (mut session, risk) = self.start().await?;

        let halt = loop {
            if *cancel.borrow_and_update() {
                break HaltReason::Cancelled;
            }
            if let TickOutcome::Halted(reason) = self.tick(&mut session, &risk).await {
                break reason;
            }
            if sleep_or_cancel(self.settings.poll_interval, &mut cancel).await {
                break HaltReason::Cancelled;
            }
        };

        self.transition(halt.state()).await;
        self.halted = Some(halt.clone());
        tracing::info!(
            reason_code = halt.reason_code(),
            ticks = session.ticks,
            orders_submitted = session.orders_submitted,
            balance = session.current_balance,
            "Session halted"
        );
        self.emit(RobotEvent::Halted(halt.clone())).await;
        Ok(SessionReport {
            risk_utilization: risk.utilization(session.current_balance),
            halt,
            session,
        })
    }
}

/// Sleep for `interval`, returning early with `true` if cancellation is requested.
///
/// A dropped sender can no longer cancel, so the remaining interval is slept out.
pub async fn sleep_or_cancel(interval: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return *cancel.borrow(),
            changed = cancel.changed() => {
                if changed.is_err() {
                    (&mut sleep).await;
                    return *cancel.borrow();
                }
                if *cancel.borrow_and_update() {
                    return true;
                }
            }
        }
    }
}
