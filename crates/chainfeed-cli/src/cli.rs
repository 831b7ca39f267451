//! CLI argument definitions for chainfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `collect` | Run one collection cycle |
//! | `watch` | Run cycles on an interval until Ctrl-C |
//! | `providers` | List registered providers and health state |
//! | `check` | Check connectivity of every provider |
//! | `runs` | Show recent collection runs |
//! | `stats` | Show per-provider collection statistics |
//! | `cache clear` | Evict provider response caches |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Multi-provider market and on-chain data collection.
///
/// Pulls analytics and exchange data from the configured providers,
/// consolidates compatible results, and stores everything as Parquet
/// plus a DuckDB run log.
#[derive(Debug, Parser)]
#[command(name = "chainfeed", version, about = "Multi-provider market data collection")]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Data directory (defaults to CHAINFEED_HOME or ~/.chainfeed).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one collection cycle across all healthy providers.
    Collect(CollectArgs),
    /// Run collection cycles on an interval until interrupted.
    Watch(WatchArgs),
    /// List registered providers with their last health outcome.
    Providers,
    /// Check connectivity of every registered provider.
    Check,
    /// Show recent collection runs from the run log.
    Runs(RunsArgs),
    /// Show per-provider aggregates over all recorded runs.
    Stats,
    /// Manage provider response caches.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Args, Clone)]
pub struct CollectArgs {
    /// Exchange symbol to collect; repeat for several.
    #[arg(long = "symbol", value_name = "SYMBOL")]
    pub symbols: Vec<String>,

    /// Candle interval for market-data targets.
    #[arg(long, default_value = "1h")]
    pub interval: String,

    /// Per-call timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Default for CollectArgs {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            interval: String::from("1h"),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub collect: CollectArgs,

    /// Seconds between cycle starts.
    #[arg(long, default_value_t = 3600)]
    pub every: u64,
}

#[derive(Debug, Args)]
pub struct RunsArgs {
    /// Maximum number of runs to show, newest first.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Evict every provider's cached responses.
    Clear,
}
