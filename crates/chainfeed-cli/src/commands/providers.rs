use std::collections::BTreeMap;

use chainfeed_core::{HealthOutcome, ProviderRegistry};
use serde_json::{json, Value};

use crate::cli::{Cli, CollectArgs};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let mut registry = super::build_registry(&CollectArgs::default())?;
    let outcomes = registry.check_all_connections().await;
    let rows = provider_rows(&registry, &outcomes)?;
    output::render(&Value::Array(rows), cli.format, cli.pretty)
}

fn provider_rows(
    registry: &ProviderRegistry,
    outcomes: &BTreeMap<String, HealthOutcome>,
) -> Result<Vec<Value>, CliError> {
    let mut rows = Vec::new();
    for name in registry.provider_names() {
        let provider = registry.get_provider(name)?;
        let datasets = provider
            .collection_targets()
            .iter()
            .map(|target| target.dataset.clone())
            .collect::<Vec<_>>();
        let auth = match provider.authenticate() {
            Ok(_) => String::from("configured"),
            Err(error) => error.message().to_owned(),
        };
        let status = match outcomes.get(name) {
            Some(HealthOutcome::Ok) => "ok",
            Some(HealthOutcome::Failed { error }) => error.kind().as_str(),
            None => "unchecked",
        };

        rows.push(json!({
            "provider": name,
            "status": status,
            "auth": auth,
            "datasets": datasets.join(","),
        }));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chainfeed_core::{DuneProvider, NoopHttpClient};

    #[tokio::test]
    async fn rows_carry_the_last_health_outcome() {
        // Dune without a key fails its connection check with an auth
        // error before any network call.
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(DuneProvider::with_http_client(
                Arc::new(NoopHttpClient),
                None,
            )))
            .expect("registration");
        let outcomes = registry.check_all_connections().await;

        let rows = provider_rows(&registry, &outcomes).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["provider"], "dune");
        assert_eq!(rows[0]["status"], "auth");
        assert_eq!(rows[0]["datasets"], "bot_volume");
    }

    #[tokio::test]
    async fn unchecked_providers_are_labelled_as_such() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(DuneProvider::with_http_client(
                Arc::new(NoopHttpClient),
                Some(String::from("key-123")),
            )))
            .expect("registration");

        let rows = provider_rows(&registry, &BTreeMap::new()).expect("rows");
        assert_eq!(rows[0]["status"], "unchecked");
        assert_eq!(rows[0]["auth"], "configured");
    }
}
