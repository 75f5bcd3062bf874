pub mod sma_rsi;
