use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use vector_store::{CollectionSchema, IndexParams, Row, VectorStoreClient};

use crate::hook::{Hook, Migration};

/// A migration declared in a TOML file. Each recognized hook is an optional
/// top-level table; hooks without a table fall back to the no-op default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationDefinition {
    #[serde(skip)]
    name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub create_collections: Option<CollectionSchema>,
    #[serde(default)]
    pub create_indexes: Option<CreateIndexes>,
    #[serde(default)]
    pub create_sample_data: Option<SampleData>,
    #[serde(default)]
    pub smoke_test_insert: Option<SmokeTestInsert>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIndexes {
    pub indexes: Vec<IndexParams>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleData {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub vector: Option<VectorSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmokeTestInsert {
    pub row: Row,
    #[serde(default)]
    pub vector: Option<VectorSpec>,
}

/// A vector field filled in on each inserted row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorSpec {
    pub field: String,
    pub dim: usize,
}

impl VectorSpec {
    /// Values in `[-1, 1]`, reproducible for a given `seed`.
    pub fn generate(&self, seed: usize) -> Vec<f32> {
        (0..self.dim)
            .map(|i| ((i + 1) as f32 * 0.618_034 + seed as f32 * 1.414_214).sin())
            .collect()
    }

    fn fill(&self, row: &mut Row, seed: usize) {
        row.insert(self.field.clone(), Value::from(self.generate(seed)));
    }
}

impl MigrationDefinition {
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let mut definition: MigrationDefinition =
            toml::from_str(content).context("Invalid migration definition")?;
        definition.name = name.to_string();
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid migration file name: {}", path.display()))?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(name, &content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hooks this definition declares, in execution order.
    pub fn defined_hooks(&self) -> Vec<Hook> {
        Hook::ALL
            .into_iter()
            .filter(|hook| match hook {
                Hook::CreateCollections => self.create_collections.is_some(),
                Hook::CreateIndexes => self.create_indexes.is_some(),
                Hook::CreateSampleData => self.create_sample_data.is_some(),
                Hook::SmokeTestInsert => self.smoke_test_insert.is_some(),
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if let Some(schema) = &self.create_collections {
            schema.validate().context("Invalid create_collections schema")?;
        }
        if let Some(create) = &self.create_indexes {
            if create.indexes.is_empty() {
                anyhow::bail!("create_indexes declares no indexes");
            }
        }
        let vectors = [
            self.create_sample_data.as_ref().and_then(|s| s.vector.as_ref()),
            self.smoke_test_insert.as_ref().and_then(|s| s.vector.as_ref()),
        ];
        for vector in vectors.into_iter().flatten() {
            if vector.dim == 0 {
                anyhow::bail!("Generated vector '{}' must have a non-zero dim", vector.field);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for MigrationDefinition {
    async fn create_collections(&self, client: &dyn VectorStoreClient, target: &str) -> Result<()> {
        let Some(schema) = &self.create_collections else {
            return Ok(());
        };

        if client.has_collection(target).await? {
            info!("Collection '{}' already exists.", target);
            return Ok(());
        }

        client.create_collection(target, schema).await?;
        info!(
            "Collection '{}' created with fields: {}",
            target,
            schema
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    async fn create_indexes(&self, client: &dyn VectorStoreClient, target: &str) -> Result<()> {
        let Some(create) = &self.create_indexes else {
            return Ok(());
        };

        if !client.has_collection(target).await? {
            warn!("Collection '{}' does not exist.", target);
            return Ok(());
        }

        let existing = client.list_indexes(target).await?;
        let missing: Vec<IndexParams> = create
            .indexes
            .iter()
            .filter(|index| {
                let present = existing.iter().any(|e| e.field_name == index.field_name);
                if present {
                    info!("Field '{}' on '{}' is already indexed", index.field_name, target);
                }
                !present
            })
            .cloned()
            .collect();

        if !missing.is_empty() {
            client.create_index(target, &missing).await?;
            info!("Created {} index(es) for collection '{}'", missing.len(), target);
        }

        let indexes = client.list_indexes(target).await?;
        info!(
            "Indexes on '{}': {:?}",
            target,
            indexes.iter().map(|i| i.index_name.as_str()).collect::<Vec<_>>()
        );
        Ok(())
    }

    async fn create_sample_data(&self, client: &dyn VectorStoreClient, target: &str) -> Result<()> {
        let Some(sample) = &self.create_sample_data else {
            return Ok(());
        };

        let rows: Vec<Row> = sample
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut row = row.clone();
                if let Some(vector) = &sample.vector {
                    vector.fill(&mut row, i);
                }
                row
            })
            .collect();

        let result = client.insert(target, rows).await?;
        info!("Inserted {} sample row(s) into '{}'", result.insert_count, target);
        Ok(())
    }

    async fn smoke_test_insert(&self, client: &dyn VectorStoreClient, target: &str) -> Result<()> {
        let Some(smoke) = &self.smoke_test_insert else {
            return Ok(());
        };

        if !client.has_collection(target).await? {
            anyhow::bail!(
                "Collection '{}' does not exist. Run create_collections first.",
                target
            );
        }

        let mut row = smoke.row.clone();
        if let Some(vector) = &smoke.vector {
            vector.fill(&mut row, 0);
        }

        let result = client.insert(target, vec![row]).await?;
        info!("Inserted test row: {:?}", result.ids);
        Ok(())
    }
}
