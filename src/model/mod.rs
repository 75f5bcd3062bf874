pub mod candle;
pub mod order;
pub mod session;
pub mod signal;
