use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::session::AccountMode;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub robot: RobotConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    pub instrument: String,
    pub account_mode: AccountMode,
    pub investment_amount: f64,
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,
    #[serde(default = "default_candle_count")]
    pub candle_count: usize,
    /// Ticks to wait after a submitted order before trading again. 0 trades every qualifying tick.
    #[serde(default)]
    pub cooldown_ticks: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_sma_short_window")]
    pub sma_short_window: usize,
    #[serde(default = "default_sma_long_window")]
    pub sma_long_window: usize,
    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub stop_loss_percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
    /// Fraction of the stake paid on top of it for a winning option.
    #[serde(default = "default_payout_rate")]
    pub payout_rate: f64,
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_expiry_minutes() -> u32 {
    1
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_candle_interval() -> String {
    "1m".to_string()
}
fn default_candle_count() -> usize {
    100
}
fn default_sma_short_window() -> usize {
    10
}
fn default_sma_long_window() -> usize {
    50
}
fn default_rsi_window() -> usize {
    14
}
fn default_rsi_oversold() -> f64 {
    30.0
}
fn default_rsi_overbought() -> f64 {
    70.0
}
fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_starting_balance() -> f64 {
    1000.0
}
fn default_payout_rate() -> f64 {
    0.8
}
fn default_journal_path() -> PathBuf {
    PathBuf::from("data/trade_journal.sqlite")
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            sma_short_window: default_sma_short_window(),
            sma_long_window: default_sma_long_window(),
            rsi_window: default_rsi_window(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            payout_rate: default_payout_rate(),
            journal_path: default_journal_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Parse a candle interval string (e.g. "30s", "1m", "4h", "1d") into seconds.
pub fn parse_interval_secs(s: &str) -> Result<u64> {
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("interval '{}' has no unit (s/m/h/d/w)", s))?;
    let (count, unit) = s.split_at(digits_end);
    let count: u64 = match count.parse() {
        Ok(n) if n > 0 => n,
        _ => bail!("interval '{}' needs a positive count before the unit", s),
    };
    let unit_secs: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        other => bail!("interval '{}' has unknown unit '{}' (s/m/h/d/w)", s, other),
    };
    count
        .checked_mul(unit_secs)
        .with_context(|| format!("interval '{}' overflows", s))
}

impl RobotConfig {
    pub fn candle_interval_secs(&self) -> Result<u64> {
        parse_interval_secs(&self.candle_interval)
    }
}

impl Config {
    /// Load `.env`, then the TOML file named by `ROBOT_CONFIG_PATH` (default `config/default.toml`).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("ROBOT_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(config_str).context("failed to parse config")?;
        config.robot.instrument = config.robot.instrument.trim().to_ascii_uppercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let robot = &self.robot;
        if robot.instrument.is_empty() {
            bail!("robot.instrument must not be empty");
        }
        if !(robot.investment_amount.is_finite() && robot.investment_amount > 0.0) {
            bail!(
                "robot.investment_amount must be > 0 (got {})",
                robot.investment_amount
            );
        }
        if robot.expiry_minutes == 0 {
            bail!("robot.expiry_minutes must be > 0");
        }
        if robot.poll_interval_secs == 0 {
            bail!("robot.poll_interval_secs must be > 0");
        }
        robot
            .candle_interval_secs()
            .context("robot.candle_interval is invalid")?;

        let risk = &self.risk;
        if !(1.0..=100.0).contains(&risk.stop_loss_percent) {
            bail!(
                "risk.stop_loss_percent must be within 1..=100 (got {})",
                risk.stop_loss_percent
            );
        }

        let s = &self.strategy;
        if s.sma_short_window == 0 || s.sma_long_window == 0 || s.rsi_window == 0 {
            bail!("strategy windows must be > 0");
        }
        if s.sma_short_window >= s.sma_long_window {
            bail!(
                "strategy.sma_short_window ({}) must be less than sma_long_window ({})",
                s.sma_short_window,
                s.sma_long_window
            );
        }
        let rsi_range = 0.0..=100.0;
        if !rsi_range.contains(&s.rsi_oversold)
            || !rsi_range.contains(&s.rsi_overbought)
            || s.rsi_oversold >= s.rsi_overbought
        {
            bail!(
                "strategy RSI thresholds must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                s.rsi_oversold,
                s.rsi_overbought
            );
        }

        let history = s.sma_short_window.max(s.sma_long_window).max(s.rsi_window);
        if robot.candle_count < history {
            bail!(
                "robot.candle_count ({}) must cover the longest indicator window ({})",
                robot.candle_count,
                history
            );
        }

        let paper = &self.paper;
        if !(paper.starting_balance.is_finite() && paper.starting_balance > 0.0) {
            bail!("paper.starting_balance must be > 0");
        }
        if !(paper.payout_rate.is_finite() && paper.payout_rate >= 0.0) {
            bail!("paper.payout_rate must be >= 0");
        }
        Ok(())
    }
}
