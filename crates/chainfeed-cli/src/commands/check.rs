use chainfeed_core::registry::HealthOutcome;
use serde_json::{json, Value};

use crate::cli::{Cli, CollectArgs};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let mut registry = super::build_registry(&CollectArgs::default())?;
    let outcomes = registry.check_all_connections().await;

    let rows = outcomes
        .iter()
        .map(|(name, outcome)| match outcome {
            HealthOutcome::Ok => json!({"provider": name, "status": "ok", "error": Value::Null}),
            HealthOutcome::Failed { error } => json!({
                "provider": name,
                "status": error.kind().as_str(),
                "error": error.message(),
            }),
        })
        .collect::<Vec<_>>();

    output::render(&Value::Array(rows), cli.format, cli.pretty)
}
