use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};

use signal_robot::broker::paper::PaperBroker;
use signal_robot::broker::{BalanceSource, Collaborators};
use signal_robot::config::Config;
use signal_robot::event::RobotEvent;
use signal_robot::manual::evaluate_once;
use signal_robot::market::rest::RestCandleSource;
use signal_robot::model::order::OrderDirection;
use signal_robot::model::session::AccountMode;
use signal_robot::model::signal::Signal;
use signal_robot::order_store::TradeJournal;
use signal_robot::strategy::sma_rsi::SmaRsiStrategy;
use signal_robot::trading_loop::{LoopSettings, TradingLoop};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "signal-robot", version, about = "SMA/RSI signal robot with a stop-loss guard")]
struct Cli {
    /// Config file. Defaults to $ROBOT_CONFIG_PATH, then config/default.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the market and trade until stop-loss, error or Ctrl-C.
    Auto,
    /// Analyze the current chart once without trading.
    Manual,
    /// Show the most recent journaled trades.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load_from_path(path)
        }
        None => Config::load(),
    };
    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Copy config/default.toml or point ROBOT_CONFIG_PATH at a valid file");
            std::process::exit(1);
        }
    };

    // Log to file so the console stays readable for the operator.
    let log_file = std::fs::File::create("signal-robot.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logging.level.as_str())
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        instrument = %config.robot.instrument,
        account_mode = %config.robot.account_mode,
        rest_url = %config.market.rest_base_url,
        "Starting signal-robot"
    );

    match cli.command {
        Command::Auto => run_auto(&config).await,
        Command::Manual => run_manual(&config).await,
        Command::History { limit } => show_history(&config, limit),
    }
}

async fn run_auto(config: &Config) -> Result<()> {
    if config.robot.account_mode == AccountMode::Real {
        bail!("account_mode = real needs a live broker adapter; this build only trades a practice account");
    }

    let settings = LoopSettings::from_config(config)?;
    let strategy = SmaRsiStrategy::from_config(&config.strategy);
    let feed = Arc::new(RestCandleSource::new(&config.market.rest_base_url)?);
    let journal = TradeJournal::open(&config.paper.journal_path)?;
    let broker = Arc::new(
        PaperBroker::new(feed, config.paper.starting_balance, config.paper.payout_rate)
            .with_journal(journal),
    );

    let (event_tx, event_rx) = mpsc::channel::<RobotEvent>(EVENT_CHANNEL_CAPACITY);
    let printer = tokio::spawn(print_events(event_rx));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling session");
            let _ = cancel_tx.send(true);
        }
    });

    println!(
        "Stop-Loss set to {:.0}% | investment per trade ${:.2} | expiry {}m",
        config.risk.stop_loss_percent, config.robot.investment_amount, config.robot.expiry_minutes
    );

    let paper = broker.clone();
    let mut robot = TradingLoop::new(settings, strategy, Collaborators::from_broker(broker))
        .with_events(event_tx);
    let outcome = robot.run(cancel_rx).await;
    drop(robot);
    let _ = printer.await;

    let report = outcome.context("trading session failed to start")?;
    println!(
        "Session ended: {} ({}) after {} ticks, {} orders, balance ${:.2} (P&L {:+.2})",
        report.state(),
        report.halt.reason_code(),
        report.session.ticks,
        report.session.orders_submitted,
        report.session.current_balance,
        report.session.pnl()
    );

    let open = paper.open_trade_count();
    if open > 0 {
        println!("Waiting for {} open option(s) to expire (Ctrl-C to leave them open)", open);
        tokio::select! {
            settled = paper.settle_remaining() => {
                let settled = settled.context("failed to settle open options")?;
                println!(
                    "Settled {} option(s), practice balance ${:.2}",
                    settled,
                    paper.get_balance().await?
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(open, "Left options open at exit");
            }
        }
    }
    Ok(())
}

async fn run_manual(config: &Config) -> Result<()> {
    let settings = LoopSettings::from_config(config)?;
    let strategy = SmaRsiStrategy::from_config(&config.strategy);
    let feed = RestCandleSource::new(&config.market.rest_base_url)?;

    println!("Manual mode: analyzing {}", settings.instrument);
    let report = evaluate_once(&feed, &settings, &strategy).await?;
    println!("{}", report);
    match report.signal {
        Signal::Buy => println!("BUY (Call) signal detected for {}!", settings.instrument),
        Signal::Sell => println!("SELL (Put) signal detected for {}!", settings.instrument),
        Signal::Hold => println!("No clear signals at the moment."),
    }
    Ok(())
}

fn show_history(config: &Config, limit: usize) -> Result<()> {
    let journal = TradeJournal::open(&config.paper.journal_path)?;
    let instrument = Some(config.robot.instrument.as_str());
    let trades = journal.recent_trades(instrument, limit)?;
    if trades.is_empty() {
        println!("No journaled trades for {}", config.robot.instrument);
        return Ok(());
    }

    println!(
        "{:<14} {:<10} {:<4} {:>9} {:>12} {:<9} {:>9}",
        "order", "opened", "dir", "amount", "entry", "status", "profit"
    );
    for t in &trades {
        println!(
            "{:<14} {:<10} {:<4} {:>9.2} {:>12.5} {:<9} {:>+9.2}",
            t.order_id,
            format_local_time(t.opened_at_ms),
            t.direction,
            t.amount,
            t.entry_price,
            t.status,
            t.profit()
        );
    }
    let summary = journal.summary(instrument)?;
    println!(
        "settled {} | won {} | lost {} | win rate {:.1}% | net {:+.2}",
        summary.trade_count,
        summary.win_count,
        summary.lose_count,
        summary.win_rate_percent(),
        summary.net_profit
    );
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<RobotEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            RobotEvent::SessionStarted {
                instrument,
                account_mode,
                baseline_balance,
            } => {
                println!("Auto mode activated. Monitoring {} ({})", instrument, account_mode);
                println!("Current Balance: ${:.2}", baseline_balance);
            }
            RobotEvent::StateChanged(state) => tracing::debug!(%state, "state"),
            RobotEvent::BalanceUpdate {
                balance,
                drawdown_pct,
                risk_utilization,
            } => println!(
                "Balance ${:.2} | drawdown {} | stop-loss budget used {:.0}%",
                balance,
                drawdown_pct
                    .map(|p| format!("{:.2}%", p))
                    .unwrap_or_else(|| "n/a".to_string()),
                risk_utilization * 100.0
            ),
            RobotEvent::Analysis(r) => println!(
                "close {:.5} | sma short {:.5} | sma long {:.5} | rsi {:.2} | {}",
                r.last_close, r.sma_short, r.sma_long, r.rsi, r.signal
            ),
            RobotEvent::Waiting { reason } => println!("{}", reason),
            RobotEvent::OrderSubmitted { order, receipt } => {
                let label = match order.direction() {
                    OrderDirection::Call => "Buy (Call)",
                    OrderDirection::Put => "Sell (Put)",
                };
                println!(
                    "{} at {} | ${:.2} on {} | order {}",
                    label,
                    format_local_time(receipt.accepted_at_ms),
                    order.amount(),
                    order.instrument(),
                    receipt.order_id
                );
            }
            RobotEvent::Halted(reason) => println!("Stopping operations: {}", reason),
        }
    }
}

fn format_local_time(timestamp_ms: u64) -> String {
    use chrono::TimeZone;
    chrono::Utc
        .timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "--:--:--".to_string())
}
