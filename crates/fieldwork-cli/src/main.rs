//! Fieldwork CLI - inspect and drain the offline operation queue
//!
//! Queues field-work mutations locally and delivers them to the backend once
//! it is reachable.

mod cli;
mod commands;
mod config;
mod error;
mod http;

use clap::Parser;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::common::{build_orchestrator, open_queue};
use crate::commands::config::{run_config_init_default, run_config_show};
use crate::commands::enqueue::{run_enqueue, run_location};
use crate::commands::list::{run_list, run_stats};
use crate::commands::maintenance::{run_clear, run_gc, run_remove, run_retry};
use crate::commands::sync::{run_service, run_sync};
use crate::config::{CliConfig, Settings};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "fieldwork=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Cli {
        command,
        data_dir,
        api_url,
    } = Cli::parse();

    // Resolved lazily so `config init` works even when the stored config is unusable.
    let resolve_settings = move || -> Result<Settings, CliError> {
        let file_config = CliConfig::load().map_err(CliError::Config)?;
        Settings::resolve(&file_config, data_dir, api_url).map_err(CliError::Config)
    };

    match command {
        Commands::Config {
            command:
                ConfigCommands::Init {
                    api_base_url,
                    auth_token,
                    data_dir,
                },
        } => run_config_init_default(api_base_url, auth_token, data_dir)?,
        Commands::Config {
            command: ConfigCommands::Show { json },
        } => run_config_show(&resolve_settings()?, json)?,
        Commands::Enqueue { operation, payload } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_enqueue(&queue, &operation, &payload).await?;
        }
        Commands::Location {
            lat,
            lng,
            accuracy,
            session_id,
        } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_location(&queue, lat, lng, accuracy, session_id.as_deref()).await?;
        }
        Commands::Stats { json } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_stats(&queue, json).await?;
        }
        Commands::List {
            status,
            limit,
            json,
        } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_list(&queue, status.map(Into::into), limit, json).await?;
        }
        Commands::Sync => {
            let settings = resolve_settings()?;
            let queue = open_queue(&settings).await?;
            let orchestrator = build_orchestrator(&settings, queue)?;
            run_sync(&orchestrator).await?;
        }
        Commands::Retry => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_retry(&queue).await;
        }
        Commands::Gc { days } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_gc(&queue, days).await;
        }
        Commands::Remove { id } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_remove(&queue, &id).await?;
        }
        Commands::Clear { yes } => {
            let queue = open_queue(&resolve_settings()?).await?;
            run_clear(&queue, yes).await?;
        }
        Commands::Run => {
            let settings = resolve_settings()?;
            let queue = open_queue(&settings).await?;
            let orchestrator = build_orchestrator(&settings, queue)?;
            run_service(&orchestrator).await?;
        }
    }

    Ok(())
}
