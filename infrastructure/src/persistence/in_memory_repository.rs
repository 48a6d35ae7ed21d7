// ./infrastructure/src/persistence/in_memory_repository.rs
use super::collection::Collection;
use application::{ApplicationError, RecordRepository, SchemaRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use domain::{Record, RecordId, SchemaDocument};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

// --- Schema Repository Implementation ---

#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaRepository {
    // Resource Name -> Schema
    schemas: Arc<DashMap<String, Arc<SchemaDocument>>>,
}

impl InMemorySchemaRepository {
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl SchemaRepository for InMemorySchemaRepository {
    #[instrument(skip(self))]
    async fn get(&self, resource: &str) -> Result<Option<SchemaDocument>, ApplicationError> {
        debug!(resource = %resource, "Getting schema from in-memory store");
        let schema = self
            .schemas
            .get(resource)
            .map(|schema_ref| (**schema_ref).clone());
        Ok(schema)
    }

    #[instrument(skip(self, schema))]
    async fn save(&self, resource: &str, schema: &SchemaDocument) -> Result<(), ApplicationError> {
        debug!(resource = %resource, "Saving schema to in-memory store");
        // Swapping the Arc replaces the whole document in one step
        self.schemas
            .insert(resource.to_string(), Arc::new(schema.clone()));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<BTreeMap<String, SchemaDocument>, ApplicationError> {
        debug!("Listing all schemas from in-memory store");
        let schemas = self
            .schemas
            .iter()
            .map(|entry| (entry.key().clone(), (**entry.value()).clone()))
            .collect();
        Ok(schemas)
    }
}

// --- Record Repository Implementation ---

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordRepository {
    // Resource Name -> records of that resource, each behind its own lock
    store: Arc<DashMap<String, Arc<RwLock<Collection>>>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Returns the collection for `resource`, creating it empty on first use.
    /// The DashMap shard guard is released before the caller awaits the lock.
    fn collection(&self, resource: &str) -> Arc<RwLock<Collection>> {
        self.store
            .entry(resource.to_string())
            .or_insert_with(Default::default)
            .value()
            .clone()
    }

    /// Returns the collection for `resource` only if something was ever
    /// created there. Reads never register a resource.
    fn existing(&self, resource: &str) -> Option<Arc<RwLock<Collection>>> {
        self.store.get(resource).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    #[instrument(skip(self))]
    async fn list(&self, resource: &str) -> Result<Vec<Record>, ApplicationError> {
        debug!(resource = %resource, "Listing records from in-memory store");
        let Some(collection) = self.existing(resource) else {
            return Ok(Vec::new());
        };
        let records = collection.read().await.records();
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        debug!(resource = %resource, id = %id, "Getting record from in-memory store");
        let Some(collection) = self.existing(resource) else {
            return Ok(None);
        };
        let record = collection.read().await.get(id);
        Ok(record)
    }

    #[instrument(skip(self, fields))]
    async fn create(
        &self,
        resource: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, ApplicationError> {
        let collection = self.collection(resource);
        // Id allocation and insertion happen under one write lock
        let record = collection.write().await.insert(fields);
        debug!(resource = %resource, id = %record.id(), "Created record in in-memory store");
        Ok(record)
    }

    #[instrument(skip(self, fields))]
    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, ApplicationError> {
        debug!(resource = %resource, id = %id, "Updating record in in-memory store");
        let Some(collection) = self.existing(resource) else {
            return Ok(None);
        };
        let record = collection.write().await.update(id, fields);
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn delete(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        debug!(resource = %resource, id = %id, "Deleting record from in-memory store");
        let Some(collection) = self.existing(resource) else {
            return Ok(None);
        };
        let record = collection.write().await.remove(id);
        Ok(record)
    }
}
