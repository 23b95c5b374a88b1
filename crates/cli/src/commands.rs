use anyhow::{Context, Result};
use db_migrations::{MigrationRunner, PlannedMigration};
use migrate_core::Config;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use vector_store::{InMemoryVectorStore, MilvusClient, VectorStoreClient};

use crate::cli::{MigrateArgs, PlanArgs};

/// An explicit path must exist; otherwise `./config.toml` is read when present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_from_env().context("Failed to load ./config.toml")?,
    };
    Ok(config.with_env_overrides())
}

fn create_client(config: &Config, offline: bool) -> Result<Arc<dyn VectorStoreClient>> {
    if offline {
        info!("Running against an in-memory store");
        return Ok(Arc::new(InMemoryVectorStore::new()));
    }

    info!("Connecting to Milvus at {}", config.milvus.url);
    Ok(Arc::new(MilvusClient::new(config.milvus.clone())?))
}

pub async fn migrate<W: Write>(config: &Config, args: MigrateArgs, out: &mut W) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.migrations.dir.clone());
    let target = args
        .target
        .unwrap_or_else(|| config.migrations.target.clone());

    let client = create_client(config, args.offline)?;
    let runner = MigrationRunner::new(client);
    let report = runner.migrate(&dir, &target, out).await?;

    info!(
        "Applied {} migration(s) to '{}' in {}ms",
        report.executed.len(),
        report.target,
        report.duration().num_milliseconds()
    );
    Ok(())
}

pub fn plan<W: Write>(config: &Config, args: PlanArgs, out: &mut W) -> Result<()> {
    let dir: PathBuf = args.dir.unwrap_or_else(|| config.migrations.dir.clone());
    let planned = MigrationRunner::plan(&dir)?;

    if planned.is_empty() {
        writeln!(out, "No migrations found in {}", dir.display())?;
        return Ok(());
    }

    for migration in &planned {
        writeln!(out, "{}", format_planned(migration))?;
    }
    Ok(())
}

fn format_planned(migration: &PlannedMigration) -> String {
    let hooks = if migration.hooks.is_empty() {
        "(no hooks)".to_string()
    } else {
        migration
            .hooks
            .iter()
            .map(|h| h.name())
            .collect::<Vec<_>>()
            .join(", ")
    };

    match &migration.description {
        Some(description) => format!("{}: {} - {}", migration.name, hooks, description),
        None => format!("{}: {}", migration.name, hooks),
    }
}
