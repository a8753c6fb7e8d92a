use clap::Parser;
use owo_colors::{OwoColorize, Style};
use std::sync::Arc;
use tally_core::db;
use tally_core::error::CoreError;
use tally_core::repository::SqliteRepository;
use tally_core::service::Tracker;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

fn init_tracing(level: &str, watching: bool) {
    let default_filter = if watching {
        format!("{level},tally::reminder=info,tally_core=info")
    } else {
        level.to_string()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(watching)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let (config, config_error) = match config::Config::new() {
        Ok(config) => (config, None),
        Err(e) => (config::Config::default(), Some(e)),
    };
    init_tracing(&config.log_level, matches!(cli.command, cli::Commands::Watch));
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "invalid configuration, using defaults");
    }

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = Arc::new(SqliteRepository::new(db_pool));
    let tracker = Tracker::new(Arc::clone(&repository), config.user_id.clone(), config.tz());

    let result = match cli.command {
        cli::Commands::Task(command) => commands::task::task_command(&tracker, command).await,
        cli::Commands::Counter(command) => {
            commands::counter::counter_command(&tracker, command, &config).await
        }
        cli::Commands::Today(command) => commands::view::today(&tracker, command).await,
        cli::Commands::Calendar(command) => commands::view::calendar(&tracker, command).await,
        cli::Commands::Notifications(command) => {
            commands::notification::notification_command(&tracker, command, &config).await
        }
        cli::Commands::Reset => commands::maintenance::reset(&tracker).await,
        cli::Commands::Wipe(flag) => commands::maintenance::wipe(&tracker, flag).await,
        cli::Commands::Watch => commands::watch::watch(repository, &config).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        Some(CoreError::AmbiguousId(candidates)) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, name) in candidates {
                eprintln!("  {} ({})", id.yellow(), name);
            }
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidDate(s)) => {
            eprintln!("{} Invalid date: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidTimezone(s)) => {
            eprintln!("{} Invalid timezone: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::Conflict(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s.yellow());
        }
        Some(core_error @ (CoreError::Database(_) | CoreError::Migration(_))) => {
            eprintln!("{} {}", "Error:".style(error_style), core_error);
            if let Some(source) = std::error::Error::source(core_error) {
                eprintln!("  caused by: {source}");
            }
        }
        _ => eprintln!("{} {}", "Error:".style(error_style), err),
    }
}
