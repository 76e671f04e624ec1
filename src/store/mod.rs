// src/store/mod.rs
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

pub mod filter;
pub mod memory;

pub use filter::Filter;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Audits,
    Companies,
    Procedures,
    ProcedureTemplates,
    Statuses,
    Users,
    Permissions,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Audits,
        Collection::Companies,
        Collection::Procedures,
        Collection::ProcedureTemplates,
        Collection::Statuses,
        Collection::Users,
        Collection::Permissions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Audits => "audits",
            Collection::Companies => "companies",
            Collection::Procedures => "procedures",
            Collection::ProcedureTemplates => "procedureTemplates",
            Collection::Statuses => "statuses",
            Collection::Users => "users",
            Collection::Permissions => "analyticsPermissions",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("malformed document in {collection}: {source}")]
    Malformed {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Document persistence the analytics core depends on. Every document carries
/// a string `_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    /// Inserts `doc` unless a document matching `filter` exists; returns the
    /// stored document either way. Must be atomic per collection.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Value,
    ) -> Result<Value, StoreError>;

    /// Replaces the first document matching `filter`, inserting when none does.
    async fn replace_one(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Value,
    ) -> Result<(), StoreError>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;
}

pub async fn find_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Vec<T>, StoreError> {
    store
        .find(collection, filter)
        .await?
        .into_iter()
        .map(|doc| decode(collection, doc))
        .collect()
}

pub async fn find_one_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Option<T>, StoreError> {
    store
        .find_one(collection, filter)
        .await?
        .map(|doc| decode(collection, doc))
        .transpose()
}

pub async fn find_by_id<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>, StoreError> {
    find_one_as(store, collection, &Filter::new().with("_id", id)).await
}

pub fn decode<T: DeserializeOwned>(collection: Collection, doc: Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|source| StoreError::Malformed {
        collection: collection.name(),
        source,
    })
}

pub fn encode<T: Serialize>(collection: Collection, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        collection: collection.name(),
        source,
    })
}
