mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chainfeed=info")),
        )
        .with_target(false)
        .init();

    let cli = cli::Cli::parse();
    if let Err(error) = commands::run(&cli).await {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}
