pub mod definition;
pub mod errors;
pub mod hook;
pub mod runner;

pub use definition::{CreateIndexes, MigrationDefinition, SampleData, SmokeTestInsert, VectorSpec};
pub use errors::MigrationError;
pub use hook::{Hook, Migration};
pub use runner::{MigrationFile, MigrationReport, MigrationRunner, PlannedMigration};
