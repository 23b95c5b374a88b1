use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vector-migrate")]
#[command(about = "Apply collection, index and sample-data migrations to Milvus", long_about = None)]
pub struct Cli {
    /// Configuration file; ./config.toml is used when present
    #[arg(short, long, global = true, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every migration in the directory, in filename order
    Migrate(MigrateArgs),
    /// List the migrations and the hooks each one defines, without running them
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Directory holding the migration files
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Collection the migrations operate on
    #[arg(short, long)]
    pub target: Option<String>,

    /// Run against an in-memory store instead of Milvus
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Directory holding the migration files
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}
