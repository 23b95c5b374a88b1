use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vector_store::VectorStoreClient;

use crate::definition::MigrationDefinition;
use crate::errors::MigrationError;
use crate::hook::{Hook, Migration};

/// File extension of migration definition files.
pub const MIGRATION_EXTENSION: &str = "toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub target: String,
    pub executed: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMigration {
    pub name: String,
    pub description: Option<String>,
    pub hooks: Vec<Hook>,
}

/// Runs every migration in a directory, in filename order, against one
/// target collection. No record of applied migrations is kept: each run
/// executes every file again.
pub struct MigrationRunner {
    client: Arc<dyn VectorStoreClient>,
}

impl MigrationRunner {
    pub fn new(client: Arc<dyn VectorStoreClient>) -> Self {
        Self { client }
    }

    /// Lists the migration files directly inside `dir`, sorted by filename.
    pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
        let metadata = fs::metadata(dir).map_err(|source| MigrationError::Config {
            path: dir.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(MigrationError::NotADirectory(dir.to_path_buf()));
        }

        let entries = fs::read_dir(dir).map_err(|source| MigrationError::Config {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrationError::Config {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_EXTENSION)
            {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => files.push(MigrationFile { name, path }),
                Err(name) => warn!("Skipping migration file with non UTF-8 name: {:?}", name),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub fn load(file: &MigrationFile) -> Result<MigrationDefinition, MigrationError> {
        MigrationDefinition::from_file(&file.path).map_err(|source| MigrationError::Load {
            file: file.name.clone(),
            source,
        })
    }

    /// Calls every hook of `migration` in [`Hook::ALL`] order, stopping at the
    /// first failure.
    pub async fn run(
        &self,
        name: &str,
        migration: &dyn Migration,
        target: &str,
    ) -> Result<(), MigrationError> {
        for hook in Hook::ALL {
            debug!("Running {} of {}", hook, name);
            hook.invoke(migration, self.client.as_ref(), target)
                .await
                .map_err(|source| MigrationError::Hook {
                    file: name.to_string(),
                    hook,
                    source,
                })?;
        }
        Ok(())
    }

    /// Discovers, loads and runs every migration in `dir`, writing one
    /// `Executed migration: <file>` line to `out` per completed file.
    pub async fn migrate<W: Write>(
        &self,
        dir: &Path,
        target: &str,
        out: &mut W,
    ) -> Result<MigrationReport, MigrationError> {
        if target.trim().is_empty() {
            return Err(MigrationError::InvalidTarget(target.to_string()));
        }

        let started_at = Utc::now();
        let files = Self::discover(dir)?;
        info!(
            "Running {} migration(s) from {} against '{}'",
            files.len(),
            dir.display(),
            target
        );

        let mut executed = Vec::with_capacity(files.len());
        for file in &files {
            let definition = Self::load(file)?;
            self.run(&file.name, &definition, target).await?;

            writeln!(out, "Executed migration: {}", file.name)?;
            info!("Executed migration: {}", file.name);
            executed.push(file.name.clone());
        }

        Ok(MigrationReport {
            target: target.to_string(),
            executed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Loads every migration in `dir` without touching the database.
    pub fn plan(dir: &Path) -> Result<Vec<PlannedMigration>, MigrationError> {
        Self::discover(dir)?
            .iter()
            .map(|file| {
                let definition = Self::load(file)?;
                Ok(PlannedMigration {
                    name: file.name.clone(),
                    hooks: definition.defined_hooks(),
                    description: definition.description,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vector_store::InMemoryVectorStore;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn runner() -> (MigrationRunner, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        (MigrationRunner::new(store.clone()), store)
    }

    /// Records which hooks ran and can be told to fail one of them.
    #[derive(Default)]
    struct RecordingMigration {
        calls: Mutex<Vec<Hook>>,
        fail_on: Option<Hook>,
    }

    impl RecordingMigration {
        fn hit(&self, hook: Hook) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(hook);
            if self.fail_on == Some(hook) {
                anyhow::bail!("{} exploded", hook);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Migration for RecordingMigration {
        async fn smoke_test_insert(&self, _c: &dyn VectorStoreClient, _t: &str) -> anyhow::Result<()> {
            self.hit(Hook::SmokeTestInsert)
        }
        async fn create_sample_data(&self, _c: &dyn VectorStoreClient, _t: &str) -> anyhow::Result<()> {
            self.hit(Hook::CreateSampleData)
        }
        async fn create_indexes(&self, _c: &dyn VectorStoreClient, _t: &str) -> anyhow::Result<()> {
            self.hit(Hook::CreateIndexes)
        }
        async fn create_collections(&self, _c: &dyn VectorStoreClient, _t: &str) -> anyhow::Result<()> {
            self.hit(Hook::CreateCollections)
        }
    }

    #[test]
    fn should_discover_files_in_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        for name in ["V3__c.toml", "V10__j.toml", "V1__a.toml", "V2__b.toml", "v0__lower.toml"] {
            write(&dir, name, "");
        }

        let names: Vec<String> = MigrationRunner::discover(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();

        assert_eq!(
            names,
            vec!["V10__j.toml", "V1__a.toml", "V2__b.toml", "V3__c.toml", "v0__lower.toml"]
        );
    }

    #[test]
    fn should_ignore_other_extensions_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V1__a.toml", "");
        write(&dir, "README.md", "# notes");
        write(&dir, "V2__b.py", "def create_collections(name): pass");
        fs::create_dir(dir.path().join("V3__nested.toml")).unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        write(&dir, "archive/V0__old.toml", "");

        let files = MigrationRunner::discover(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "V1__a.toml");
        assert_eq!(files[0].path, dir.path().join("V1__a.toml"));
    }

    #[test]
    fn should_return_empty_list_for_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(MigrationRunner::discover(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn should_fail_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = MigrationRunner::discover(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, MigrationError::Config { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn should_fail_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V1__a.toml", "");
        let err = MigrationRunner::discover(&dir.path().join("V1__a.toml")).unwrap_err();
        assert!(matches!(err, MigrationError::NotADirectory(_)));
    }

    #[test]
    fn should_wrap_parse_failures_as_load_errors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V1__broken.toml", "[create_collections\n");
        let files = MigrationRunner::discover(dir.path()).unwrap();

        let err = MigrationRunner::load(&files[0]).unwrap_err();

        assert!(matches!(err, MigrationError::Load { .. }));
        assert_eq!(err.file(), Some("V1__broken.toml"));
    }

    #[tokio::test]
    async fn should_run_hooks_in_fixed_order() {
        let (runner, store) = runner();
        let migration = RecordingMigration::default();

        runner.run("V1__x.toml", &migration, "materials_chunks").await.unwrap();

        assert_eq!(*migration.calls.lock().unwrap(), Hook::ALL.to_vec());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn should_stop_at_failing_hook() {
        let (runner, _store) = runner();
        let migration = RecordingMigration {
            fail_on: Some(Hook::CreateIndexes),
            ..Default::default()
        };

        let err = runner
            .run("V2__create_indexes.toml", &migration, "materials_chunks")
            .await
            .unwrap_err();

        assert_eq!(
            *migration.calls.lock().unwrap(),
            vec![Hook::CreateCollections, Hook::CreateIndexes]
        );
        match err {
            MigrationError::Hook { file, hook, .. } => {
                assert_eq!(file, "V2__create_indexes.toml");
                assert_eq!(hook, Hook::CreateIndexes);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_log_file_without_hooks_and_make_no_calls() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V1__noop.toml", "description = \"nothing to do\"\n");
        let (runner, store) = runner();
        let mut out = Vec::new();

        let report = runner
            .migrate(dir.path(), "materials_chunks", &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Executed migration: V1__noop.toml\n");
        assert_eq!(report.executed, vec!["V1__noop.toml"]);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn should_succeed_with_no_output_for_empty_directory() {
        let dir = TempDir::new().unwrap();
        let (runner, _store) = runner();
        let mut out = Vec::new();

        let report = runner.migrate(dir.path(), "t", &mut out).await.unwrap();

        assert!(out.is_empty());
        assert!(report.executed.is_empty());
        assert!(report.duration() >= chrono::Duration::zero());
    }

    #[tokio::test]
    async fn should_reject_blank_target() {
        let dir = TempDir::new().unwrap();
        let (runner, _store) = runner();
        let mut out = Vec::new();

        let err = runner.migrate(dir.path(), "  ", &mut out).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn should_abort_on_load_error_after_earlier_files_ran() {
        let dir = TempDir::new().unwrap();
        write(&dir, "V1__ok.toml", "");
        write(&dir, "V2__broken.toml", "this is not toml");
        write(&dir, "V3__never.toml", "");
        let (runner, _store) = runner();
        let mut out = Vec::new();

        let err = runner.migrate(dir.path(), "t", &mut out).await.unwrap_err();

        assert_eq!(err.file(), Some("V2__broken.toml"));
        assert_eq!(String::from_utf8(out).unwrap(), "Executed migration: V1__ok.toml\n");
    }

    #[test]
    fn should_plan_without_touching_the_store() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "V2__idx.toml",
            "description = \"index\"\n[create_indexes]\nindexes = [{ field_name = \"embedding\", index_type = \"FLAT\", metric_type = \"L2\" }]\n",
        );
        write(&dir, "V1__empty.toml", "");

        let plan = MigrationRunner::plan(dir.path()).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].name, "V1__empty.toml");
        assert!(plan[0].hooks.is_empty());
        assert_eq!(plan[1].hooks, vec![Hook::CreateIndexes]);
        assert_eq!(plan[1].description.as_deref(), Some("index"));
    }
}
