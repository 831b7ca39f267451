use serde_json::json;
use tracing::info;

use crate::cli::{Cli, CollectArgs};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli, args: &CollectArgs) -> Result<(), CliError> {
    let pipeline = super::build_pipeline(cli, args)?;

    // Health checks gate the cycle: only providers that pass are
    // collected from.
    let registry = pipeline.registry();
    let outcomes = registry.write().await.check_all_connections().await;
    let active = outcomes.values().filter(|outcome| outcome.is_ok()).count();
    info!(active, total = outcomes.len(), "providers checked");

    let run = pipeline.run_data_collection().await?;
    let payload = json!({
        "run_id": run.run_id,
        "state": run.state,
        "started_at": run.started_at,
        "finished_at": run.finished_at,
        "successes": run.success_count,
        "failures": run.failure_count,
        "total_rows": run.total_rows,
        "consolidated_files": run.consolidated_files,
        "results": run.results,
    });
    output::render(&payload, cli.format, cli.pretty)
}
