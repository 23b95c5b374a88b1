use anyhow::{Context, Result};
use async_trait::async_trait;
use migrate_core::MilvusConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::client::VectorStoreClient;
use crate::models::{CollectionSchema, FieldSchema, IndexDescription, IndexParams, InsertResult, Row};

/// Client for the Milvus RESTful API (v2).
pub struct MilvusClient {
    config: MilvusConfig,
    client: Client,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HasCollectionData {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribedIndex {
    index_name: String,
    field_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertData {
    insert_count: usize,
    #[serde(default)]
    insert_ids: Vec<Value>,
}

enum RequestError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl MilvusClient {
    pub fn new(config: MilvusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            client,
            retry_delay: Duration::from_millis(1000),
        })
    }

    /// Base delay of the exponential backoff between retries.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v2/vectordb/{}",
            self.config.url.trim_end_matches('/'),
            path
        )
    }

    /// Sends a request that only reads state; transport errors and 5xx are retried.
    async fn read<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.post(path, body, self.config.max_retries).await
    }

    /// Sends a request that changes state. It is never re-sent: a timed-out
    /// write may already have been applied by the server.
    async fn write<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.post(path, body, 0).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value, max_retries: u32) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match self.try_post(path, &body).await {
                Ok(data) => {
                    return serde_json::from_value(data)
                        .with_context(|| format!("Unexpected response shape from Milvus {}", path));
                }
                Err(RequestError::Fatal(e)) => return Err(e),
                Err(RequestError::Retryable(e)) => {
                    tracing::warn!("Milvus request {} failed (attempt {}): {}", path, attempt + 1, e);
                    last_error = Some(e);
                    if attempt < max_retries {
                        let delay = self.retry_delay * 2_u32.pow(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Milvus request {} was not attempted", path)))
    }

    async fn try_post(&self, path: &str, body: &Value) -> std::result::Result<Value, RequestError> {
        let mut request = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to Milvus")
            .map_err(RequestError::Retryable)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error = anyhow::anyhow!("Milvus API returned error {}: {}", status, error_text);
            return Err(if status.is_server_error() {
                RequestError::Retryable(error)
            } else {
                RequestError::Fatal(error)
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .context("Failed to parse Milvus API response")
            .map_err(RequestError::Fatal)?;

        if envelope.code != 0 {
            return Err(RequestError::Fatal(anyhow::anyhow!(
                "Milvus {} failed with code {}: {}",
                path,
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

fn field_to_json(field: &FieldSchema) -> Value {
    let mut element_params = serde_json::Map::new();
    if let Some(dim) = field.dim {
        element_params.insert("dim".to_string(), json!(dim.to_string()));
    }
    if let Some(max_length) = field.max_length {
        element_params.insert("max_length".to_string(), json!(max_length.to_string()));
    }

    let mut value = json!({
        "fieldName": field.name,
        "dataType": field.data_type,
        "isPrimary": field.is_primary,
    });
    if !element_params.is_empty() {
        value["elementTypeParams"] = Value::Object(element_params);
    }
    if let Some(description) = &field.description {
        value["description"] = json!(description);
    }
    value
}

fn schema_to_json(schema: &CollectionSchema) -> Value {
    json!({
        "autoId": schema.primary_field().map(|f| f.auto_id).unwrap_or(false),
        "enableDynamicField": schema.enable_dynamic_field,
        "fields": schema.fields.iter().map(field_to_json).collect::<Vec<_>>(),
    })
}

fn index_to_json(index: &IndexParams) -> Value {
    let mut params = index.params.clone();
    params.insert("index_type".to_string(), json!(index.index_type));
    json!({
        "fieldName": index.field_name,
        "indexName": index.effective_name(),
        "metricType": index.metric_type,
        "params": params,
    })
}

#[async_trait]
impl VectorStoreClient for MilvusClient {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.read("collections/list", json!({ "dbName": self.config.database }))
            .await
            .context("Failed to list collections")
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        let data: HasCollectionData = self
            .read(
                "collections/has",
                json!({ "dbName": self.config.database, "collectionName": name }),
            )
            .await
            .with_context(|| format!("Failed to check collection '{}'", name))?;
        Ok(data.has)
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        schema.validate()?;

        let mut body = json!({
            "dbName": self.config.database,
            "collectionName": name,
            "schema": schema_to_json(schema),
        });
        if let Some(description) = &schema.description {
            body["description"] = json!(description);
        }

        let _: Value = self
            .write("collections/create", body)
            .await
            .with_context(|| format!("Failed to create collection '{}'", name))?;
        tracing::info!("Created collection '{}' with {} fields", name, schema.fields.len());
        Ok(())
    }

    async fn create_index(&self, collection: &str, indexes: &[IndexParams]) -> Result<()> {
        let body = json!({
            "dbName": self.config.database,
            "collectionName": collection,
            "indexParams": indexes.iter().map(index_to_json).collect::<Vec<_>>(),
        });

        let _: Value = self
            .write("indexes/create", body)
            .await
            .with_context(|| format!("Failed to create indexes on '{}'", collection))?;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexDescription>> {
        let names: Vec<String> = self
            .read(
                "indexes/list",
                json!({ "dbName": self.config.database, "collectionName": collection }),
            )
            .await
            .with_context(|| format!("Failed to list indexes on '{}'", collection))?;

        let mut indexes = Vec::with_capacity(names.len());
        for index_name in names {
            let described: Vec<DescribedIndex> = self
                .read(
                    "indexes/describe",
                    json!({
                        "dbName": self.config.database,
                        "collectionName": collection,
                        "indexName": index_name,
                    }),
                )
                .await
                .with_context(|| format!("Failed to describe index '{}'", index_name))?;
            indexes.extend(described.into_iter().map(|d| IndexDescription {
                index_name: d.index_name,
                field_name: d.field_name,
            }));
        }

        Ok(indexes)
    }

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> Result<InsertResult> {
        if rows.is_empty() {
            return Ok(InsertResult {
                insert_count: 0,
                ids: vec![],
            });
        }

        let data: InsertData = self
            .write(
                "entities/insert",
                json!({
                    "dbName": self.config.database,
                    "collectionName": collection,
                    "data": rows,
                }),
            )
            .await
            .with_context(|| format!("Failed to insert rows into '{}'", collection))?;

        Ok(InsertResult {
            insert_count: data.insert_count,
            ids: data.insert_ids,
        })
    }
}
