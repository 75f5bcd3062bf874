//! Indicator derivation from a candle window.
//!
//! Everything here is pure: closes in, snapshots out. No clock, no I/O.

pub mod rsi;
pub mod sma;

use crate::error::RobotError;
use crate::model::candle::Candle;

use self::rsi::Rsi;
use self::sma::Sma;

/// Window sizes for the three indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorWindows {
    pub sma_short: usize,
    pub sma_long: usize,
    pub rsi: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            sma_short: 10,
            sma_long: 50,
            rsi: 14,
        }
    }
}

impl IndicatorWindows {
    /// Candles needed before every indicator is defined at the newest index.
    pub fn required_history(&self) -> usize {
        self.sma_short.max(self.sma_long).max(self.rsi)
    }
}

/// Indicator values at one candle index. A field is `None` until its window has filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub timestamp: i64,
    pub close: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
}

/// A snapshot with every indicator defined; the only input the signal rule accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadySnapshot {
    pub timestamp: i64,
    pub close: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub rsi: f64,
}

impl IndicatorSnapshot {
    pub fn ready(&self) -> Option<ReadySnapshot> {
        Some(ReadySnapshot {
            timestamp: self.timestamp,
            close: self.close,
            sma_short: self.sma_short?,
            sma_long: self.sma_long?,
            rsi: self.rsi?,
        })
    }
}

/// Compute snapshots aligned to `candles`.
///
/// Fails with [`RobotError::InsufficientData`] when the input is shorter than the
/// largest window, rather than returning a series whose newest entry is partial.
///
/// RSI smoothing remembers every close since the first candle. The neutral 50
/// therefore needs the whole input flat, not just the last `windows.rsi` closes.
pub fn compute_indicators(
    candles: &[Candle],
    windows: &IndicatorWindows,
) -> Result<Vec<IndicatorSnapshot>, RobotError> {
    let required = windows.required_history();
    if candles.len() < required {
        return Err(RobotError::InsufficientData {
            required,
            available: candles.len(),
        });
    }

    let mut sma_short = Sma::new(windows.sma_short);
    let mut sma_long = Sma::new(windows.sma_long);
    let mut rsi = Rsi::new(windows.rsi);

    Ok(candles
        .iter()
        .enumerate()
        .map(|(index, candle)| IndicatorSnapshot {
            index,
            timestamp: candle.timestamp,
            close: candle.close,
            sma_short: sma_short.push(candle.close),
            sma_long: sma_long.push(candle.close),
            rsi: rsi.push(candle.close),
        })
        .collect())
}

/// Newest fully defined snapshot of `candles`.
pub fn latest_snapshot(
    candles: &[Candle],
    windows: &IndicatorWindows,
) -> Result<ReadySnapshot, RobotError> {
    compute_indicators(candles, windows)?
        .last()
        .and_then(IndicatorSnapshot::ready)
        .ok_or(RobotError::InsufficientData {
            required: windows.required_history(),
            available: candles.len(),
        })
}
