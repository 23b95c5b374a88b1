use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A row as sent to the store: field name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    VarChar,
    #[serde(rename = "JSON", alias = "Json")]
    Json,
    FloatVector,
    BinaryVector,
}

impl DataType {
    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::FloatVector | DataType::BinaryVector)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub dim: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldSchema {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            is_primary: false,
            auto_id: false,
            dim: None,
            max_length: None,
            description: None,
        }
    }

    pub fn primary(mut self, auto_id: bool) -> Self {
        self.is_primary = true;
        self.auto_id = auto_id;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = Some(dim);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enable_dynamic_field: bool,
}

impl CollectionSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            description: None,
            enable_dynamic_field: false,
        }
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks the constraints the server would otherwise reject at create time.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            anyhow::bail!("Schema must declare at least one field");
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                anyhow::bail!("Duplicate field name '{}'", field.name);
            }
            if field.data_type.is_vector() && field.dim.is_none() {
                anyhow::bail!("Vector field '{}' requires a dim", field.name);
            }
            if field.data_type == DataType::VarChar && field.max_length.is_none() {
                anyhow::bail!("VarChar field '{}' requires a max_length", field.name);
            }
            if field.auto_id && !field.is_primary {
                anyhow::bail!("Field '{}' sets auto_id but is not the primary key", field.name);
            }
        }

        let primaries = self.fields.iter().filter(|f| f.is_primary).count();
        if primaries != 1 {
            anyhow::bail!("Schema must have exactly one primary key field, found {}", primaries);
        }

        let primary = self.primary_field().map(|f| f.data_type);
        if !matches!(primary, Some(DataType::Int64) | Some(DataType::VarChar)) {
            anyhow::bail!("Primary key must be Int64 or VarChar");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexParams {
    pub field_name: String,
    #[serde(default)]
    pub index_name: Option<String>,
    pub index_type: String,
    pub metric_type: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl IndexParams {
    pub fn new(field_name: &str, index_type: &str, metric_type: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            index_name: None,
            index_type: index_type.to_string(),
            metric_type: metric_type.to_string(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// Index name sent to the server; Milvus names an unnamed index after its field.
    pub fn effective_name(&self) -> &str {
        self.index_name.as_deref().unwrap_or(&self.field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub index_name: String,
    pub field_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub insert_count: usize,
    pub ids: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn materials_schema() -> CollectionSchema {
        CollectionSchema::new(vec![
            FieldSchema::new("id", DataType::Int64).primary(true),
            FieldSchema::new("embedding", DataType::FloatVector).with_dim(1536),
            FieldSchema::new("metadata", DataType::VarChar).with_max_length(65535),
        ])
    }

    #[test]
    fn should_accept_valid_schema() {
        let schema = materials_schema();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.primary_field().unwrap().name, "id");
        assert_eq!(schema.field("embedding").unwrap().dim, Some(1536));
    }

    #[test]
    fn should_reject_schema_without_primary_key() {
        let schema = CollectionSchema::new(vec![
            FieldSchema::new("embedding", DataType::FloatVector).with_dim(8),
        ]);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("exactly one primary key"));
    }

    #[test]
    fn should_reject_vector_field_without_dim() {
        let schema = CollectionSchema::new(vec![
            FieldSchema::new("id", DataType::Int64).primary(true),
            FieldSchema::new("embedding", DataType::FloatVector),
        ]);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("requires a dim"));
    }

    #[test]
    fn should_reject_varchar_without_max_length() {
        let schema = CollectionSchema::new(vec![
            FieldSchema::new("id", DataType::VarChar).primary(false),
        ]);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("max_length"));
    }

    #[test]
    fn should_reject_duplicate_field_names() {
        let schema = CollectionSchema::new(vec![
            FieldSchema::new("id", DataType::Int64).primary(true),
            FieldSchema::new("id", DataType::Int64),
        ]);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate field name"));
    }

    #[test]
    fn should_reject_float_primary_key() {
        let schema = CollectionSchema::new(vec![FieldSchema::new("id", DataType::Float).primary(false)]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn should_deserialize_json_data_type_from_either_spelling() {
        let upper: DataType = serde_json::from_value(json!("JSON")).unwrap();
        let title: DataType = serde_json::from_value(json!("Json")).unwrap();
        assert_eq!(upper, DataType::Json);
        assert_eq!(title, DataType::Json);
        assert_eq!(serde_json::to_value(DataType::Json).unwrap(), json!("JSON"));
    }

    #[test]
    fn should_default_index_name_to_field_name() {
        let index = IndexParams::new("embedding", "IVF_FLAT", "COSINE").with_param("nlist", json!(128));
        assert_eq!(index.effective_name(), "embedding");
        assert_eq!(index.params.get("nlist"), Some(&json!(128)));

        let named = IndexParams {
            index_name: Some("embedding_ivf".to_string()),
            ..index
        };
        assert_eq!(named.effective_name(), "embedding_ivf");
    }
}
