use std::sync::Arc;
use std::time::Duration;

use chainfeed_pipeline::start_automated_collection;
use tracing::info;

use crate::cli::{Cli, WatchArgs};
use crate::error::CliError;

pub async fn run(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let pipeline = super::build_pipeline(cli, &args.collect)?;
    pipeline.registry().write().await.check_all_connections().await;

    let handle = start_automated_collection(
        Arc::clone(&pipeline),
        Duration::from_secs(args.every.max(1)),
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received; stopping after the current cycle");
    handle.cancel();
    handle.join().await;
    Ok(())
}
