use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use vector_store::VectorStoreClient;

/// Lifecycle hooks a migration may implement, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    CreateCollections,
    CreateIndexes,
    CreateSampleData,
    SmokeTestInsert,
}

impl Hook {
    pub const ALL: [Hook; 4] = [
        Hook::CreateCollections,
        Hook::CreateIndexes,
        Hook::CreateSampleData,
        Hook::SmokeTestInsert,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Hook::CreateCollections => "create_collections",
            Hook::CreateIndexes => "create_indexes",
            Hook::CreateSampleData => "create_sample_data",
            Hook::SmokeTestInsert => "smoke_test_insert",
        }
    }

    /// Dispatches to the matching method of `migration`.
    pub async fn invoke(
        self,
        migration: &dyn Migration,
        client: &dyn VectorStoreClient,
        target: &str,
    ) -> Result<()> {
        match self {
            Hook::CreateCollections => migration.create_collections(client, target).await,
            Hook::CreateIndexes => migration.create_indexes(client, target).await,
            Hook::CreateSampleData => migration.create_sample_data(client, target).await,
            Hook::SmokeTestInsert => migration.smoke_test_insert(client, target).await,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of schema or data change against one target collection.
///
/// Every hook defaults to a no-op, so an implementation only overrides the
/// steps it needs. The runner always calls all four, in [`Hook::ALL`] order.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Ensure the target collection exists. Must be safe to call repeatedly.
    async fn create_collections(&self, _client: &dyn VectorStoreClient, _target: &str) -> Result<()> {
        Ok(())
    }

    /// Ensure the vector index exists. Must be safe to call repeatedly.
    async fn create_indexes(&self, _client: &dyn VectorStoreClient, _target: &str) -> Result<()> {
        Ok(())
    }

    async fn create_sample_data(&self, _client: &dyn VectorStoreClient, _target: &str) -> Result<()> {
        Ok(())
    }

    /// Insert a single row, failing if the target collection is missing.
    async fn smoke_test_insert(&self, _client: &dyn VectorStoreClient, _target: &str) -> Result<()> {
        Ok(())
    }
}
