use std::collections::VecDeque;

/// Streaming simple moving average of the last `window` closes.
#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    closes: VecDeque<f64>,
    total: f64,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "SMA window must be > 0");
        Self {
            window,
            closes: VecDeque::with_capacity(window + 1),
            total: 0.0,
        }
    }

    /// Add `close` and return the mean once the window is full.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        self.closes.push_back(close);
        self.total += close;
        if self.closes.len() > self.window {
            if let Some(evicted) = self.closes.pop_front() {
                self.total -= evicted;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        self.is_ready().then(|| self.total / self.window as f64)
    }

    pub fn is_ready(&self) -> bool {
        self.closes.len() == self.window
    }
}
