use std::path::PathBuf;
use thiserror::Error;

use crate::hook::Hook;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration directory {} is missing or unreadable", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid target collection name: {0:?}")]
    InvalidTarget(String),

    #[error("Failed to load migration {file}")]
    Load {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Migration {file} failed in {hook}")]
    Hook {
        file: String,
        hook: Hook,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write migration output")]
    Output(#[from] std::io::Error),
}

impl MigrationError {
    /// True for errors raised before any migration ran.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MigrationError::Config { .. }
                | MigrationError::NotADirectory(_)
                | MigrationError::InvalidTarget(_)
        )
    }

    /// Returns true if re-running without changing any file could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrationError::Config { .. } => false, // Directory has to be fixed by hand
            MigrationError::NotADirectory(_) => false,
            MigrationError::InvalidTarget(_) => false,
            MigrationError::Load { .. } => false, // Broken definition stays broken
            MigrationError::Hook { .. } => true,  // Network or server state may recover
            MigrationError::Output(_) => true,
        }
    }

    /// Name of the migration file the error belongs to, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            MigrationError::Load { file, .. } | MigrationError::Hook { file, .. } => Some(file),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory")
    }

    #[test]
    fn should_classify_config_errors() {
        let missing = MigrationError::Config {
            path: PathBuf::from("/missing"),
            source: io_error(),
        };
        assert!(missing.is_config_error());
        assert!(!missing.is_retryable());
        assert!(MigrationError::InvalidTarget(String::new()).is_config_error());

        let hook = MigrationError::Hook {
            file: "V2__create_indexes.toml".to_string(),
            hook: Hook::CreateIndexes,
            source: anyhow::anyhow!("timeout"),
        };
        assert!(!hook.is_config_error());
        assert!(hook.is_retryable());
    }

    #[test]
    fn should_format_hook_error_with_file_and_hook() {
        let err = MigrationError::Hook {
            file: "V3__insert_sample_data.toml".to_string(),
            hook: Hook::SmokeTestInsert,
            source: anyhow::anyhow!("Collection 'x' does not exist"),
        };

        assert_eq!(
            err.to_string(),
            "Migration V3__insert_sample_data.toml failed in smoke_test_insert"
        );
        assert_eq!(err.file(), Some("V3__insert_sample_data.toml"));
        assert!(err
            .source()
            .unwrap()
            .to_string()
            .contains("does not exist"));
    }

    #[test]
    fn should_not_be_retryable_for_load_errors() {
        let err = MigrationError::Load {
            file: "V1_create_collections.toml".to_string(),
            source: anyhow::anyhow!("expected `=`"),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.file(), Some("V1_create_collections.toml"));
    }
}
