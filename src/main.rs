//! Hyperliquid copy-trading worker.
//!
//! Follows selected traders on Hyperliquid and mirrors their position
//! changes with sizing scaled to a per-trader allocation.

mod api;
mod config;
mod db;
mod metrics;
mod models;
mod trading;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{
    ExchangeClient, ExecutionClient, InfoClient, LiveExecution, SimulatedExecution,
    MAINNET_API_URL, TESTNET_API_URL,
};
use crate::config::Settings;
use crate::db::Database;
use crate::metrics::MetricsCalculator;
use crate::trading::{AllocationMode, CopyWorker, WorkerConfig};

/// Hyperliquid copy-trading CLI.
#[derive(Parser)]
#[command(name = "hypercopy")]
#[command(about = "Copy trades from successful Hyperliquid traders", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the top accounts from the stats leaderboard
    Leaderboard {
        /// Maximum number of accounts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Performance window (day, week, month, allTime)
        #[arg(short, long, default_value = "month")]
        window: String,
    },

    /// Start copying a trader
    Follow {
        /// Trader's wallet address
        address: String,

        /// Optional display name
        #[arg(short, long)]
        name: Option<String>,

        /// Capital allocated to this trader in USD
        #[arg(short, long, default_value = "100")]
        allocation: f64,

        /// Allocation mode (fixed or percentage)
        #[arg(short, long, default_value = "fixed")]
        mode: String,

        /// Hard cap on a single mirrored position in USD
        #[arg(long, default_value = "1000")]
        max_position: f64,
    },

    /// Stop copying a trader (history is kept)
    Unfollow {
        /// Trader's wallet address
        address: String,
    },

    /// Pause copying without unfollowing
    Pause {
        /// Trader's wallet address
        address: String,
    },

    /// Resume a paused trader
    Resume {
        /// Trader's wallet address
        address: String,
    },

    /// List followed traders and their performance
    List,

    /// Show computed performance stats for any account
    Stats {
        /// Account address
        address: String,

        /// Fill history lookback in days
        #[arg(short, long, default_value = "30")]
        days: i64,
    },

    /// Start the copy worker
    Run {
        /// Polling interval in seconds
        #[arg(short, long, default_value = "3")]
        interval: u64,

        /// Place real orders instead of simulating
        #[arg(long)]
        live: bool,

        /// Use mainnet instead of testnet
        #[arg(long)]
        mainnet: bool,
    },

    /// Show copying status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load()?;
    let db = Database::new(&settings.database_url).await?;

    match cli.command {
        Commands::Leaderboard { limit, window } => {
            let info = InfoClient::new(MAINNET_API_URL)?;
            let rows = info.get_leaderboard().await?;

            let mut ranked: Vec<_> = rows
                .iter()
                .filter_map(|row| row.window(&window).map(|perf| (row, perf)))
                .collect();
            ranked.sort_by(|a, b| b.1.pnl.cmp(&a.1.pnl));

            println!(
                "\n{:<44} {:<16} {:>14} {:>10} {:>14}",
                "ADDRESS", "NAME", "PNL", "ROI", "ACCOUNT VALUE"
            );
            println!("{}", "-".repeat(102));

            for (row, perf) in ranked.iter().take(limit) {
                println!(
                    "{:<44} {:<16} {:>14.2} {:>9.1}% {:>14.2}",
                    row.eth_address,
                    truncate(row.display_name.as_deref().unwrap_or("-"), 14),
                    perf.pnl,
                    perf.roi * Decimal::from(100),
                    row.account_value,
                );
            }
        }

        Commands::Follow {
            address,
            name,
            allocation,
            mode,
            max_position,
        } => {
            if db.get_config_by_address(&address).await?.is_some() {
                println!("Already following {}", address);
                return Ok(());
            }

            let mode = AllocationMode::from_str(&mode);
            let id = db
                .create_copy_config(
                    &address,
                    name.as_deref(),
                    Decimal::try_from(allocation)?,
                    mode,
                    Decimal::try_from(max_position)?,
                )
                .await?;

            info!(address = %address, config_id = id, "Created copy config");
            println!("Now following {} (config #{})", address, id);
            println!("  Allocation:   ${} ({})", allocation, mode.as_str());
            println!("  Max position: ${}", max_position);
        }

        Commands::Unfollow { address } => {
            if db.stop_copy_config(&address).await? {
                println!("Stopped following {}", address);
            } else {
                println!("Not following {}", address);
            }
        }

        Commands::Pause { address } => {
            if db.set_config_paused(&address, true).await? {
                println!("Paused copying {}", address);
            } else {
                println!("Not following {}", address);
            }
        }

        Commands::Resume { address } => {
            if db.set_config_paused(&address, false).await? {
                println!("Resumed copying {}", address);
            } else {
                println!("Not following {}", address);
            }
        }

        Commands::List => {
            let configs = db.get_active_configs().await?;
            if configs.is_empty() {
                println!("No traders followed. Use 'hypercopy follow <address>' to add one.");
                return Ok(());
            }

            println!(
                "\n{:<44} {:<12} {:>10} {:<10} {:>8} {:>10}",
                "ADDRESS", "NAME", "ALLOC", "MODE", "TRADES", "PNL"
            );
            println!("{}", "-".repeat(100));

            for cfg in &configs {
                let perf = db.get_performance(cfg.id).await?;
                let (trades, pnl) = perf
                    .map(|p| (p.total_trades, p.total_pnl))
                    .unwrap_or((0, 0.0));
                let paused = if cfg.is_paused { " (paused)" } else { "" };

                println!(
                    "{:<44} {:<12} {:>10} {:<10} {:>8} {:>10.2}{}",
                    cfg.trader_address,
                    truncate(&cfg.display_name(), 10),
                    cfg.allocation,
                    cfg.mode.as_str(),
                    trades,
                    pnl,
                    paused,
                );
            }
        }

        Commands::Stats { address, days } => {
            let info = InfoClient::new(MAINNET_API_URL)?;
            let start = chrono::Utc::now().timestamp_millis() - days * 24 * 3600 * 1000;

            println!("Fetching {} days of fills for {}...", days, address);
            let batch = info.get_fills_since(&address, start).await?;
            let state = info.get_user_state(&address).await?;

            let m = MetricsCalculator::from_fills(&address, &batch.fills);
            db.upsert_tracked_account(
                &address,
                None,
                state.account_value.to_f64().unwrap_or(0.0),
                &m,
            )
            .await?;

            println!("\n=== Account: {} ===", address);
            println!("Account Value:  ${}", state.account_value);
            println!("Open Positions: {}", state.positions.len());

            println!("\n--- Closed Positions ({} days) ---", days);
            println!("Total Trades:   {}", m.total_trades);
            println!("Total Volume:   ${:.2}", m.total_volume);
            println!("Total P&L:      ${:.2}", m.total_pnl);

            println!("\n--- Win/Loss ---");
            println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
            println!("Winning Trades: {}", m.winning_trades);
            println!("Losing Trades:  {}", m.losing_trades);
            println!("Avg Win:        ${:.2}", m.avg_win);
            println!("Avg Loss:       ${:.2}", m.avg_loss);
            println!("Profit Factor:  {:.2}", m.profit_factor);
            println!(
                "Best Streak:    {} wins / {} losses",
                m.max_consecutive_wins, m.max_consecutive_losses
            );

            println!("\n--- Risk ---");
            println!("Max Drawdown:   {:.1}%", m.max_drawdown * 100.0);
            println!("Sharpe Ratio:   {:.2}", m.sharpe_ratio);
            println!("ROI (est):      {:.1}%", m.roi * 100.0);

            println!("\nComposite Score: {:.1}/100", m.score());

            for pos in state.positions.values() {
                println!(
                    "  {} {} @ {} (uPnL: ${})",
                    pos.coin,
                    pos.size,
                    pos.entry_price,
                    pos.unrealized_pnl
                );
            }
        }

        Commands::Run {
            interval,
            live,
            mainnet,
        } => {
            let base_url = if mainnet {
                warn!("Running against MAINNET");
                MAINNET_API_URL
            } else {
                TESTNET_API_URL
            };

            // Zero configs is fine; the worker keeps polling and picks up
            // traders followed while it runs.
            let configs = db.get_active_configs().await?;
            if configs.is_empty() {
                println!("No traders followed yet. Add one with 'hypercopy follow <address>'.");
            }

            let info = InfoClient::new(base_url)?;

            let mut our_address = settings.wallet_address.clone();
            let execution: Arc<dyn ExecutionClient> = if live {
                let exchange = match settings.private_key.as_deref() {
                    Some(key) => ExchangeClient::new(key, base_url)?,
                    None => anyhow::bail!(
                        "Live mode requires HYPERCOPY_PRIVATE_KEY in the environment"
                    ),
                };
                if our_address.is_none() {
                    our_address = Some(format!("{:?}", exchange.address()));
                }
                info!(address = ?exchange.address(), "Exchange client initialized");
                Arc::new(LiveExecution::new(exchange))
            } else {
                Arc::new(SimulatedExecution::new())
            };

            let worker_config = WorkerConfig {
                poll_interval_secs: interval,
                ..WorkerConfig::default()
            };

            println!("\n=== Hyperliquid Copy Worker ===");
            println!("Network:          {}", if mainnet { "mainnet" } else { "testnet" });
            println!("Mode:             {}", if live { "LIVE TRADING" } else { "SIMULATED (no real orders)" });
            println!("Polling interval: {}s", interval);
            println!("Followed traders: {}", configs.len());
            println!("\nPress Ctrl+C to stop.\n");

            let mut worker = CopyWorker::new(info, db, execution, worker_config, our_address);
            worker.run().await?;
        }

        Commands::Status => {
            let configs = db.get_active_configs().await?;
            if configs.is_empty() {
                println!("No traders followed. Use 'hypercopy follow <address>' first.");
                return Ok(());
            }

            println!("\n=== Copy Status ===");
            for cfg in &configs {
                println!("\nTrader: {} ({})", cfg.display_name(), cfg.trader_address);
                println!(
                    "  Allocation:   ${} ({}), max position ${}",
                    cfg.allocation,
                    cfg.mode.as_str(),
                    cfg.max_position
                );
                println!("  State:        {}", if cfg.is_paused { "paused" } else { "active" });

                match db.get_performance(cfg.id).await? {
                    Some(p) => {
                        println!("  Trades:       {} ({} wins)", p.total_trades, p.winning_trades);
                        println!("  Source P&L:   ${:.2} (ROI {:.1}%)", p.total_pnl, p.roi);
                        println!(
                            "  Best/Worst:   ${:.2} / ${:.2}",
                            p.best_trade_pnl, p.worst_trade_pnl
                        );
                        println!("  Last Updated: {}", p.last_updated);
                    }
                    None => println!("  Trades:       none copied yet"),
                }

                let recent = db.get_recent_copied_trades(&cfg.trader_address, 5).await?;
                if !recent.is_empty() {
                    println!("  Recent:");
                    for t in recent {
                        println!(
                            "    {} {} {} {} @ {} [{}]",
                            t.created_at, t.action, t.side, t.size, t.price, t.status
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Truncate a string with ellipsis if too long. Cuts on char boundaries so
/// unicode display names never split mid-character.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("whale", 10), "whale");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
    }

    #[test]
    fn truncate_cuts_long_strings_with_ellipsis() {
        assert_eq!(truncate("0x1234567890abcdef", 10), "0x12345...");
    }

    #[test]
    fn truncate_handles_multibyte_display_names() {
        // Each char here is multiple bytes; a byte-index cut would panic.
        assert_eq!(truncate("трейдер-кит-профи", 10), "трейдер...");
        assert_eq!(truncate("鯨鯨鯨", 10), "鯨鯨鯨");
    }
}
