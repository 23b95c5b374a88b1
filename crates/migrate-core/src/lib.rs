pub mod config;

pub use config::{Config, MigrationsConfig, MilvusConfig};
