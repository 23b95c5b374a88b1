use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub milvus: MilvusConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    pub url: String,
    pub token: Option<String>,
    pub database: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            url: "http://standalone:19530".to_string(),
            token: None,
            database: "default".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl MilvusConfig {
    pub fn with_env_overrides(&self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup("MILVUS_URL").unwrap_or_else(|| self.url.clone()),
            token: lookup("MILVUS_TOKEN").or_else(|| self.token.clone()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub dir: PathBuf,
    pub target: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./migrations"),
            target: "final_test".to_string(),
        }
    }
}

impl MigrationsConfig {
    pub fn with_env_overrides(&self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            dir: lookup("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| self.dir.clone()),
            target: lookup("MIGRATION_TARGET").unwrap_or_else(|| self.target.clone()),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the file named by `CONFIG_PATH`, falling back to `./config.toml`.
    /// A missing default file yields the built-in defaults; an explicitly
    /// named file must exist.
    pub fn load_from_env() -> anyhow::Result<Self> {
        match env::var("CONFIG_PATH") {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Self::load_or_default(Path::new(&Self::default_config_path())),
        }
    }

    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> String {
        "./config.toml".to_string()
    }

    pub fn with_env_overrides(&self) -> Self {
        Self {
            milvus: self.milvus.with_env_overrides(),
            migrations: self.migrations.with_env_overrides(),
        }
    }
}
