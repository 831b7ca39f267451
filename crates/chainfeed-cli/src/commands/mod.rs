mod cache;
mod check;
mod collect;
mod providers;
mod runs;
mod stats;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use chainfeed_core::{
    DuneProvider, HyperliquidProvider, Interval, ProviderRegistry, Symbol,
};
use chainfeed_pipeline::{Pipeline, PipelineOptions};
use chainfeed_store::{Store, StoreConfig};

use crate::cli::{CacheAction, Cli, CollectArgs, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Collect(args) => collect::run(cli, args).await,
        Command::Watch(args) => watch::run(cli, args).await,
        Command::Providers => providers::run(cli).await,
        Command::Check => check::run(cli).await,
        Command::Runs(args) => runs::run(cli, args),
        Command::Stats => stats::run(cli),
        Command::Cache {
            action: CacheAction::Clear,
        } => cache::clear(cli).await,
    }
}

/// Opens the store configured by the global flags.
pub(crate) fn open_store(cli: &Cli) -> Result<Store, CliError> {
    let config = match &cli.data_dir {
        Some(home) => StoreConfig::with_home(home.clone()),
        None => StoreConfig::default(),
    };
    Ok(Store::open(config)?)
}

/// Builds the default registry: Dune analytics plus the Hyperliquid
/// exchange, configured from the collect flags.
pub(crate) fn build_registry(args: &CollectArgs) -> Result<ProviderRegistry, CliError> {
    let interval: Interval = args.interval.parse()?;
    let symbols = args
        .symbols
        .iter()
        .map(|raw| raw.parse::<Symbol>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut hyperliquid = HyperliquidProvider::new().with_interval(interval);
    if !symbols.is_empty() {
        hyperliquid = hyperliquid.with_symbols(symbols);
    }

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(DuneProvider::new()))?;
    registry.register(Arc::new(hyperliquid))?;
    Ok(registry)
}

pub(crate) fn build_pipeline(cli: &Cli, args: &CollectArgs) -> Result<Arc<Pipeline>, CliError> {
    let store = open_store(cli)?;
    let registry = build_registry(args)?;
    let options = PipelineOptions {
        call_timeout: Duration::from_secs(args.timeout_secs.max(1)),
        timeframe: args.interval.clone(),
        ..PipelineOptions::default()
    };
    Ok(Arc::new(Pipeline::new(registry, store, options)))
}
