use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CollectionSchema, IndexDescription, IndexParams, InsertResult, Row};

/// The three capability groups a migration needs from the vector database:
/// collection management, index management and row inserts.
#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.list_collections().await?.iter().any(|c| c == name))
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()>;

    async fn create_index(&self, collection: &str, indexes: &[IndexParams]) -> Result<()>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescription>>;

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> Result<InsertResult>;
}
