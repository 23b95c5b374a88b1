use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the migration lines only.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Command::Migrate(args) => {
            info!("Starting migrations");
            commands::migrate(&config, args, &mut stdout).await
        }
        Command::Plan(args) => commands::plan(&config, args, &mut stdout),
    }
}
