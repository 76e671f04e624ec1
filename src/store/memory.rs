// src/store/memory.rs
use anyhow::{Context, Result as AnyResult, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::path::Path;

use super::{Collection, DocumentStore, Filter, StoreError};

/// In-process document store. Each collection lives behind one dashmap shard
/// entry, so writes to a collection are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a seed document shaped as
    /// `{"audits": [...], "companies": [...], ...}`; unknown keys are ignored.
    pub fn from_seed(seed: &Value) -> AnyResult<Self> {
        let root = seed
            .as_object()
            .ok_or_else(|| anyhow!("seed must be a JSON object"))?;
        let store = Self::new();
        for collection in Collection::ALL {
            let Some(docs) = root.get(collection.name()) else {
                continue;
            };
            let docs = docs
                .as_array()
                .ok_or_else(|| anyhow!("seed key '{}' must be an array", collection.name()))?;
            store.insert_many(collection, docs.iter().cloned());
            tracing::debug!("Seeded {} {} documents", docs.len(), collection.name());
        }
        Ok(store)
    }

    pub fn from_seed_file(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let seed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        Self::from_seed(&seed)
    }

    /// Inverse of [`Self::from_seed`].
    pub fn to_seed(&self) -> Value {
        let root: Map<String, Value> = Collection::ALL
            .into_iter()
            .map(|c| {
                let docs = self.collections.get(&c).map(|d| d.value().clone()).unwrap_or_default();
                (c.name().to_string(), Value::Array(docs))
            })
            .collect();
        Value::Object(root)
    }

    pub fn write_seed_file(&self, path: impl AsRef<Path>) -> AnyResult<()> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(&self.to_seed())?;
        std::fs::write(path, raw).with_context(|| format!("writing seed file {}", path.display()))
    }

    pub fn insert(&self, collection: Collection, doc: Value) {
        self.collections.entry(collection).or_default().push(doc);
    }

    pub fn insert_many(&self, collection: Collection, docs: impl IntoIterator<Item = Value>) {
        self.collections.entry(collection).or_default().extend(docs);
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Value,
    ) -> Result<Value, StoreError> {
        let mut docs = self.collections.entry(collection).or_default();
        if let Some(existing) = docs.iter().find(|d| filter.matches(d)) {
            return Ok(existing.clone());
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn replace_one(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Value,
    ) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(slot) => *slot = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let Some(mut docs) = self.collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}
