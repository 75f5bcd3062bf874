/// Outcome of a drawdown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskStatus {
    Ok,
    Breached,
}

impl RiskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Ok => "risk.ok",
            RiskStatus::Breached => "risk.drawdown_breach",
        }
    }

    pub fn is_breached(self) -> bool {
        self == RiskStatus::Breached
    }
}

/// Session drawdown guard.
///
/// The baseline is fixed when the monitor is built. A breach is terminal for the
/// session; resuming requires a new monitor built from a fresh baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMonitor {
    baseline_balance: f64,
    stop_loss_percent: f64,
}

impl RiskMonitor {
    pub fn new(baseline_balance: f64, stop_loss_percent: f64) -> Self {
        Self {
            baseline_balance,
            stop_loss_percent,
        }
    }

    pub fn baseline_balance(&self) -> f64 {
        self.baseline_balance
    }

    pub fn stop_loss_percent(&self) -> f64 {
        self.stop_loss_percent
    }

    /// Percentage lost relative to the baseline (negative when in profit).
    /// `None` when the baseline cannot anchor a percentage.
    pub fn drawdown_pct(&self, current_balance: f64) -> Option<f64> {
        if !self.baseline_balance.is_finite() || self.baseline_balance <= 0.0 {
            return None;
        }
        Some((self.baseline_balance - current_balance) * 100.0 / self.baseline_balance)
    }

    /// Fails closed: an unusable baseline or balance is always a breach.
    pub fn check_drawdown(&self, current_balance: f64) -> RiskStatus {
        if !current_balance.is_finite() {
            return RiskStatus::Breached;
        }
        match self.drawdown_pct(current_balance) {
            Some(pct) if pct < self.stop_loss_percent => RiskStatus::Ok,
            _ => RiskStatus::Breached,
        }
    }

    /// Share of the stop-loss budget already consumed, clamped to `[0, 1]`.
    pub fn utilization(&self, current_balance: f64) -> f64 {
        match self.drawdown_pct(current_balance) {
            Some(pct) if self.stop_loss_percent > 0.0 => {
                (pct / self.stop_loss_percent).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_is_negative_drawdown() {
        let m = RiskMonitor::new(1000.0, 10.0);
        let pct = m.drawdown_pct(1100.0).unwrap();
        assert!((pct + 10.0).abs() < 1e-12);
        assert_eq!(m.check_drawdown(1100.0), RiskStatus::Ok);
        assert_eq!(m.utilization(1100.0), 0.0);
    }

    #[test]
    fn utilization_tracks_budget() {
        let m = RiskMonitor::new(1000.0, 10.0);
        assert!((m.utilization(950.0) - 0.5).abs() < 1e-12);
        assert_eq!(m.utilization(800.0), 1.0);
    }

    #[test]
    fn non_finite_inputs_fail_closed() {
        assert_eq!(
            RiskMonitor::new(f64::NAN, 10.0).check_drawdown(1000.0),
            RiskStatus::Breached
        );
        assert_eq!(
            RiskMonitor::new(1000.0, 10.0).check_drawdown(f64::NAN),
            RiskStatus::Breached
        );
    }
}
