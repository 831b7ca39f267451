use serde_json::json;

use crate::cli::{Cli, CollectArgs};
use crate::error::CliError;
use crate::output;

pub async fn clear(cli: &Cli) -> Result<(), CliError> {
    let registry = super::build_registry(&CollectArgs::default())?;
    registry.clear_all_caches().await;

    let payload = json!({
        "cleared": registry.provider_names(),
    });
    output::render(&payload, cli.format, cli.pretty)
}
