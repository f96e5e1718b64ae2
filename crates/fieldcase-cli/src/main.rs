//! fieldcase CLI - field casework against the offline-first local store
//!
//! Mirrors cases/licenses locally, captures notes while offline, and replays
//! queued work when connectivity returns.

mod cli;
mod client;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::CliError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Sync => {
            client::require_remote(&cli)?;
            let service = client::build_service(&cli).await?;
            commands::sync::run_full_sync(&service).await
        }
        Commands::Detail { kind, id } => {
            client::require_remote(&cli)?;
            let service = client::build_service(&cli).await?;
            commands::sync::run_detail_sync(&service, (*kind).into(), id).await
        }
        Commands::List { kind, json } => {
            let service = client::build_service(&cli).await?;
            commands::list::run_list(&service, (*kind).into(), *json).await
        }
        Commands::Notes { kind, id, json } => {
            let service = client::build_service(&cli).await?;
            commands::list::run_notes(&service, (*kind).into(), id, *json).await
        }
        Commands::AddNote {
            kind,
            id,
            text,
            author,
        } => {
            let service = client::build_service(&cli).await?;
            commands::add_note::run_add_note(&service, (*kind).into(), id, text, author.clone())
                .await
        }
        Commands::Pending => {
            let service = client::build_service(&cli).await?;
            commands::pending::run_pending(&service).await
        }
        Commands::Prune => {
            let service = client::build_service(&cli).await?;
            commands::sync::run_prune(&service).await
        }
    }
}
