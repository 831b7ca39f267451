use crate::cli::{Cli, RunsArgs};
use crate::error::CliError;
use crate::output;

pub fn run(cli: &Cli, args: &RunsArgs) -> Result<(), CliError> {
    let store = super::open_store(cli)?;
    let history = store.run_history(args.limit.max(1))?;
    output::render(&serde_json::to_value(history)?, cli.format, cli.pretty)
}
