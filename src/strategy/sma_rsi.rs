use std::fmt;

use crate::config::StrategyConfig;
use crate::error::RobotError;
use crate::indicator::{latest_snapshot, IndicatorWindows, ReadySnapshot};
use crate::model::candle::Candle;
use crate::model::signal::Signal;

/// RSI levels that qualify a trend as oversold / overbought.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// Trend-filtered RSI rule. First match wins; boundary values fall through to `Hold`.
pub fn evaluate_signal(snapshot: &ReadySnapshot, thresholds: &SignalThresholds) -> Signal {
    if snapshot.sma_short > snapshot.sma_long && snapshot.rsi < thresholds.oversold {
        Signal::Buy
    } else if snapshot.sma_short < snapshot.sma_long && snapshot.rsi > thresholds.overbought {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Result of one analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisReport {
    pub timestamp: i64,
    pub last_close: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub rsi: f64,
    pub signal: Signal,
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Last Price: {:.5}", self.last_close)?;
        writeln!(f, "Short SMA: {:.5}", self.sma_short)?;
        writeln!(f, "Long SMA: {:.5}", self.sma_long)?;
        writeln!(f, "RSI: {:.2}", self.rsi)?;
        write!(f, "Signal: {}", self.signal)
    }
}

/// SMA crossover filtered by RSI extremes.
///
/// Both the trading loop and the one-shot manual evaluation go through
/// [`SmaRsiStrategy::analyze`], so the two can never disagree on the same candles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmaRsiStrategy {
    pub windows: IndicatorWindows,
    pub thresholds: SignalThresholds,
}

impl SmaRsiStrategy {
    pub fn new(windows: IndicatorWindows, thresholds: SignalThresholds) -> Self {
        Self {
            windows,
            thresholds,
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self::new(
            IndicatorWindows {
                sma_short: cfg.sma_short_window,
                sma_long: cfg.sma_long_window,
                rsi: cfg.rsi_window,
            },
            SignalThresholds {
                oversold: cfg.rsi_oversold,
                overbought: cfg.rsi_overbought,
            },
        )
    }

    pub fn required_history(&self) -> usize {
        self.windows.required_history()
    }

    pub fn analyze(&self, candles: &[Candle]) -> Result<AnalysisReport, RobotError> {
        let snapshot = latest_snapshot(candles, &self.windows)?;
        Ok(AnalysisReport {
            timestamp: snapshot.timestamp,
            last_close: snapshot.close,
            sma_short: snapshot.sma_short,
            sma_long: snapshot.sma_long,
            rsi: snapshot.rsi,
            signal: evaluate_signal(&snapshot, &self.thresholds),
        })
    }
}
