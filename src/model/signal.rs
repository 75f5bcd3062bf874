use std::fmt;

use super::order::OrderDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Order direction a signal trades, `None` for `Hold`.
    pub fn direction(self) -> Option<OrderDirection> {
        match self {
            Signal::Buy => Some(OrderDirection::Call),
            Signal::Sell => Some(OrderDirection::Put),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "NONE"),
        }
    }
}
