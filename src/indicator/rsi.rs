//! Relative Strength Index with Wilder smoothing.
//!
//! Average gain and average loss are exponentially smoothed with α = 1/window,
//! seeded at the first close with a zero delta. A value is reported once
//! `window` closes have been seen.

#[derive(Debug, Clone)]
pub struct Rsi {
    window: usize,
    alpha: f64,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    count: usize,
}

impl Rsi {
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "RSI window must be > 0");
        Self {
            window,
            alpha: 1.0 / window as f64,
            prev_close: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
            count: 0,
        }
    }

    pub fn push(&mut self, close: f64) -> Option<f64> {
        let (gain, loss) = match self.prev_close.replace(close) {
            Some(prev) => {
                let delta = close - prev;
                (delta.max(0.0), (-delta).max(0.0))
            }
            None => (0.0, 0.0),
        };

        if self.count == 0 {
            self.avg_gain = gain;
            self.avg_loss = loss;
        } else {
            self.avg_gain += self.alpha * (gain - self.avg_gain);
            self.avg_loss += self.alpha * (loss - self.avg_loss);
        }
        self.count += 1;
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.count >= self.window {
            Some(rsi_from_averages(self.avg_gain, self.avg_loss))
        } else {
            None
        }
    }
}

/// Map smoothed averages to `[0, 100]`. Flat input (no gains, no losses) is neutral 50.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain <= 0.0 && avg_loss <= 0.0 {
        50.0
    } else if avg_loss <= 0.0 {
        100.0
    } else if avg_gain <= 0.0 {
        0.0
    } else {
        let rs = avg_gain / avg_loss;
        (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
    }
}
