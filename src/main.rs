//! Stackhive CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stackhive::cli::{commands, App, Cli, Commands};
use stackhive::services::{Config, ConfigLoader};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("Failed to load configuration")?;

    let _log_guard = init_tracing(&config, matches!(cli.command, Commands::Serve));

    let app = App::build(config)
        .await
        .context("Failed to initialize application")?;

    match cli.command {
        Commands::Serve => commands::handle_serve(app).await?,
        Commands::Stack(stack_cmd) => commands::handle_stack(&app, stack_cmd, cli.json).await?,
        Commands::Chat(chat_cmd) => commands::handle_chat(&app, chat_cmd, cli.json).await?,
    }

    Ok(())
}

/// Configure tracing output. In serve mode with a log directory, write
/// rolling daily files; otherwise log to stderr. The returned guard must
/// live for the process lifetime.
fn init_tracing(
    config: &Config,
    serve_mode: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    match (&config.logging.directory, serve_mode) {
        (Some(directory), true) => {
            let appender = tracing_appender::rolling::daily(directory, "stackhive.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if config.logging.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            Some(guard)
        }
        _ => {
            if config.logging.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            None
        }
    }
}
