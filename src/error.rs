use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobotError {
    #[error("config error: {0}")]
    Config(String),

    #[error("insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("data unavailable during {operation}: {message}")]
    DataUnavailable {
        operation: &'static str,
        message: String,
    },

    #[error("broker session is not connected")]
    NotConnected,

    #[error("order submission failed: {0}")]
    OrderSubmission(String),
}

impl RobotError {
    /// Wrap a collaborator failure, keeping the full context chain.
    pub fn unavailable(operation: &'static str, err: &anyhow::Error) -> Self {
        RobotError::DataUnavailable {
            operation,
            message: format!("{:#}", err),
        }
    }

    /// A missing or short candle window is retried on the next tick. Everything else halts.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RobotError::InsufficientData { .. }
                | RobotError::DataUnavailable {
                    operation: "get_candles",
                    ..
                }
        )
    }
}
