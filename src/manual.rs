use chrono::{DateTime, Utc};

use crate::broker::CandleSource;
use crate::error::RobotError;
use crate::strategy::sma_rsi::{AnalysisReport, SmaRsiStrategy};
use crate::trading_loop::LoopSettings;

/// Fetch the candle window and run the strategy on it.
///
/// The trading loop calls this on every tick, so a manual evaluation and an
/// automatic one see identical requests and identical analysis.
pub async fn analyze_market(
    candles: &dyn CandleSource,
    settings: &LoopSettings,
    strategy: &SmaRsiStrategy,
    as_of: DateTime<Utc>,
) -> Result<AnalysisReport, RobotError> {
    let window = candles
        .get_candles(
            &settings.instrument,
            settings.timeframe_secs,
            settings.candle_count,
            as_of,
        )
        .await
        .map_err(|e| RobotError::unavailable("get_candles", &e))?;
    strategy.analyze(&window)
}

/// One analysis cycle, no order and no loop.
pub async fn evaluate_once(
    candles: &dyn CandleSource,
    settings: &LoopSettings,
    strategy: &SmaRsiStrategy,
) -> Result<AnalysisReport, RobotError> {
    let report = analyze_market(candles, settings, strategy, Utc::now()).await?;
    tracing::info!(
        instrument = %settings.instrument,
        last_close = report.last_close,
        sma_short = report.sma_short,
        sma_long = report.sma_long,
        rsi = report.rsi,
        signal = %report.signal,
        "Manual evaluation"
    );
    Ok(report)
}
