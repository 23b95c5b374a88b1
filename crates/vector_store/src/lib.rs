pub mod client;
pub mod memory;
pub mod milvus;
pub mod models;

pub use client::VectorStoreClient;
pub use memory::{InMemoryVectorStore, Operation, StoreCall};
pub use milvus::MilvusClient;
pub use models::{
    CollectionSchema, DataType, FieldSchema, IndexDescription, IndexParams, InsertResult, Row,
};
