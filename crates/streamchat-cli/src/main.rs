mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod output;
mod render;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use streamchat_core::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = &cli.command {
        completions::generate_completions(*shell);
        return Ok(());
    }

    let _guard = init_logging(cli.verbose)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "streamchat starting");

    let mut config = config::CliConfig::load();
    config.apply_overrides(&cli);

    let mut chat = setup::prepare_chat(&config)?;
    let format = cli.format;

    match cli.command {
        None | Some(Commands::Chat) => commands::chat::run(&mut chat).await,
        Some(Commands::Send(args)) => commands::send::run(&mut chat, args, format).await,
        Some(Commands::Session { command }) => {
            commands::session::run(&mut chat, command, format).await
        }
        Some(Commands::Models { command }) => {
            commands::models::run(&mut chat, command, format).await
        }
        Some(Commands::Completions { .. }) => Ok(()),
    }
}

/// Log to a daily file so streamed output on stdout stays clean.
fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = paths::logs_dir()?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "streamchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(guard)
}
