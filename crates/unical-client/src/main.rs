//! unical CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use unical_core::{TracingConfig, init_tracing};

use unical_client::cli::{Cli, Command, ConfigAction};
use unical_client::commands;
use unical_client::config::ClientConfig;
use unical_client::error::{ClientError, ClientResult};
use unical_client::setup;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = match &cli.command {
        _ if cli.debug => TracingConfig::cli_debug(),
        Command::Watch { json: true, .. } => TracingConfig::daemon(),
        _ => TracingConfig::default(),
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)?;

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Path => commands::config::path(&config_path),
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
        },
        Command::Sync { provider, json } => {
            let orchestrator = setup::connect(&config).await;
            commands::sync::run(&orchestrator, provider, json).await
        }
        Command::Search(args) => {
            let orchestrator = setup::connect(&config).await;
            commands::search::run(&orchestrator, &args).await
        }
        Command::Watch { interval, .. } => {
            let orchestrator = Arc::new(setup::register(&config));
            let interval = interval.map(|m| Duration::from_secs(m * 60));
            commands::watch::run(orchestrator, interval).await
        }
    }
}
