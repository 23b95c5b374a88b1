use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::client::VectorStoreClient;
use crate::models::{CollectionSchema, DataType, IndexDescription, IndexParams, InsertResult, Row};

/// Every call made against an [`InMemoryVectorStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListCollections,
    CreateCollection(String),
    CreateIndex(String),
    ListIndexes(String),
    Insert(String, usize),
}

impl StoreCall {
    pub fn operation(&self) -> Operation {
        match self {
            StoreCall::ListCollections => Operation::ListCollections,
            StoreCall::CreateCollection(_) => Operation::CreateCollection,
            StoreCall::CreateIndex(_) => Operation::CreateIndex,
            StoreCall::ListIndexes(_) => Operation::ListIndexes,
            StoreCall::Insert(_, _) => Operation::Insert,
        }
    }

    /// Whether the call changed the store, as opposed to reading from it.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreCall::CreateCollection(_) | StoreCall::CreateIndex(_) | StoreCall::Insert(_, _)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCollections,
    CreateCollection,
    CreateIndex,
    ListIndexes,
    Insert,
}

#[derive(Debug)]
struct StoredCollection {
    schema: CollectionSchema,
    indexes: Vec<IndexParams>,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, StoredCollection>,
    calls: Vec<StoreCall>,
    failing: HashSet<Operation>,
}

/// Vector store kept entirely in process memory. Used for offline runs and
/// as a recording fake in tests.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    state: Mutex<State>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.state().collections.keys().cloned().collect()
    }

    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.state()
            .collections
            .get(collection)
            .map(|c| c.rows.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: StoreCall) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        let operation = call.operation();
        state.calls.push(call);
        if state.failing.contains(&operation) {
            anyhow::bail!("Injected failure for {:?}", operation);
        }
        Ok(state)
    }
}

fn validate_row(schema: &CollectionSchema, row: &Row) -> Result<()> {
    for field in &schema.fields {
        if field.is_primary && field.auto_id {
            if row.contains_key(&field.name) {
                anyhow::bail!("Field '{}' is auto-generated and must not be supplied", field.name);
            }
            continue;
        }

        let value = row
            .get(&field.name)
            .ok_or_else(|| anyhow::anyhow!("Row is missing field '{}'", field.name))?;

        if field.data_type == DataType::FloatVector {
            let actual = value.as_array().map(Vec::len);
            if actual != field.dim {
                anyhow::bail!(
                    "Vector field '{}' expects dim {:?}, got {:?}",
                    field.name,
                    field.dim,
                    actual
                );
            }
        }
    }

    if !schema.enable_dynamic_field {
        if let Some(extra) = row.keys().find(|key| schema.field(key).is_none()) {
            anyhow::bail!("Field '{}' is not in the schema and dynamic fields are disabled", extra);
        }
    }

    Ok(())
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let state = self.record(StoreCall::ListCollections)?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.record(StoreCall::CreateCollection(name.to_string()))?;
        schema.validate()?;
        if state.collections.contains_key(name) {
            anyhow::bail!("Collection '{}' already exists", name);
        }
        state.collections.insert(
            name.to_string(),
            StoredCollection {
                schema: schema.clone(),
                indexes: Vec::new(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    async fn create_index(&self, collection: &str, indexes: &[IndexParams]) -> Result<()> {
        let mut state = self.record(StoreCall::CreateIndex(collection.to_string()))?;
        let stored = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", collection))?;

        for index in indexes {
            if stored.schema.field(&index.field_name).is_none() {
                anyhow::bail!("Field '{}' does not exist in '{}'", index.field_name, collection);
            }
            if stored.indexes.iter().any(|i| i.field_name == index.field_name) {
                anyhow::bail!("Field '{}' already has an index", index.field_name);
            }
        }
        stored.indexes.extend(indexes.iter().cloned());
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescription>> {
        let state = self.record(StoreCall::ListIndexes(collection.to_string()))?;
        let stored = state
            .collections
            .get(collection)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", collection))?;

        Ok(stored
            .indexes
            .iter()
            .map(|i| IndexDescription {
                index_name: i.effective_name().to_string(),
                field_name: i.field_name.clone(),
            })
            .collect())
    }

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> Result<InsertResult> {
        if rows.is_empty() {
            return Ok(InsertResult {
                insert_count: 0,
                ids: vec![],
            });
        }

        let mut state = self.record(StoreCall::Insert(collection.to_string(), rows.len()))?;
        let stored = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", collection))?;

        for row in &rows {
            validate_row(&stored.schema, row)?;
        }

        let auto_id_field = stored
            .schema
            .primary_field()
            .filter(|f| f.auto_id)
            .map(|f| f.name.clone());

        let mut ids = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = match &auto_id_field {
                Some(name) => {
                    let id = Value::from(stored.next_id);
                    stored.next_id += 1;
                    row.insert(name.clone(), id.clone());
                    id
                }
                None => stored
                    .schema
                    .primary_field()
                    .and_then(|f| row.get(&f.name).cloned())
                    .unwrap_or(Value::Null),
            };
            ids.push(id);
            stored.rows.push(row);
        }

        Ok(InsertResult {
            insert_count: ids.len(),
            ids,
        })
    }
}
