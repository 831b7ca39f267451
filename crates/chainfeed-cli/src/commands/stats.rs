use crate::cli::Cli;
use crate::error::CliError;
use crate::output;

pub fn run(cli: &Cli) -> Result<(), CliError> {
    let store = super::open_store(cli)?;
    let stats = store.collection_stats()?;
    output::render(&serde_json::to_value(stats)?, cli.format, cli.pretty)
}
