use async_trait::async_trait;
use domain::{
    DomainError, Record, RecordId, SchemaDocument, Violation, defaults::default_schemas,
    validate_resource_name,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub mod pagination;

pub use pagination::{Page, PageMetadata, PageRequest, paginate};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Record '{id}' not found in resource '{resource}'")]
    RecordNotFound { resource: String, id: RecordId },
    #[error("Schema for resource '{0}' not found")]
    SchemaNotFound(String),
    #[error("Validation failed with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
}

// --- Infrastructure Interfaces (Traits) ---

/// Interface for storing and retrieving the schema document of each resource.
///
/// Implementations must replace documents atomically: a concurrent `get`
/// sees either the old or the new document, never a mix.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Retrieves the schema of a resource, if one is set.
    async fn get(&self, resource: &str) -> Result<Option<SchemaDocument>, ApplicationError>;
    /// Installs or fully replaces the schema of a resource.
    async fn save(&self, resource: &str, schema: &SchemaDocument) -> Result<(), ApplicationError>;
    /// Lists every schema keyed by resource name.
    async fn list(&self) -> Result<BTreeMap<String, SchemaDocument>, ApplicationError>;
}

/// Interface for the record collections of every resource.
///
/// Collections are created lazily on first access. Mutations on one resource
/// are linearizable; id allocation in `create` is atomic and monotonic, so an
/// id is never handed out twice within a process lifetime. Repositories trust
/// that the caller already validated `fields`.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// All records of a resource in creation order.
    async fn list(&self, resource: &str) -> Result<Vec<Record>, ApplicationError>;
    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError>;
    /// Stores `fields` under the next unused id and returns the new record.
    async fn create(
        &self,
        resource: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, ApplicationError>;
    /// Replaces all non-id fields. `None` if the record does not exist.
    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, ApplicationError>;
    /// Removes a record, returning it. `None` if it did not exist.
    async fn delete(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError>;
}

// --- Application Services (Use Cases) ---

/// Service for managing resource schemas.
pub struct SchemaService {
    schema_repo: Arc<dyn SchemaRepository>,
}

impl SchemaService {
    pub fn new(schema_repo: Arc<dyn SchemaRepository>) -> Self {
        Self { schema_repo }
    }

    #[instrument(skip(self))]
    pub async fn get_schema(&self, resource: &str) -> Result<SchemaDocument, ApplicationError> {
        info!(resource = %resource, "Attempting to retrieve schema");
        validate_resource_name(resource)?;
        self.schema_repo.get(resource).await?.ok_or_else(|| {
            warn!(resource = %resource, "Schema not found");
            ApplicationError::SchemaNotFound(resource.to_string())
        })
    }

    #[instrument(skip(self))]
    pub async fn list_schemas(&self) -> Result<BTreeMap<String, SchemaDocument>, ApplicationError> {
        info!("Attempting to list all schemas");
        self.schema_repo.list().await.map_err(|e| {
            error!("Failed to list schemas from repository: {}", e);
            e
        })
    }

    /// Installs or replaces the schema of `resource`. The new document
    /// governs every write that starts after this returns; stored records
    /// are not re-validated.
    #[instrument(skip(self, document))]
    pub async fn put_schema(
        &self,
        resource: &str,
        document: Value,
    ) -> Result<SchemaDocument, ApplicationError> {
        info!(resource = %resource, "Attempting to replace schema");
        validate_resource_name(resource)?;
        let schema = SchemaDocument::parse(document).map_err(|e| {
            warn!(resource = %resource, "Rejected schema document: {}", e);
            e
        })?;

        self.schema_repo.save(resource, &schema).await.map_err(|e| {
            error!(resource = %resource, "Failed to save schema: {}", e);
            e
        })?;
        info!(resource = %resource, "Schema saved successfully");
        Ok(schema)
    }

    /// Installs the built-in schemas that are not already present.
    /// Returns how many were installed.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<usize, ApplicationError> {
        let mut installed = 0;
        for (resource, schema) in default_schemas() {
            if self.schema_repo.get(resource).await?.is_some() {
                debug!(resource = %resource, "Schema already present, not seeding");
                continue;
            }
            self.schema_repo.save(resource, &schema).await?;
            installed += 1;
        }
        info!(installed, "Default schemas seeded");
        Ok(installed)
    }
}

/// Service implementing CRUD over any resource name, gated by its schema.
pub struct ResourceService {
    schema_repo: Arc<dyn SchemaRepository>, // Consulted before every write
    record_repo: Arc<dyn RecordRepository>,
}

impl ResourceService {
    pub fn new(
        schema_repo: Arc<dyn SchemaRepository>,
        record_repo: Arc<dyn RecordRepository>,
    ) -> Self {
        Self {
            schema_repo,
            record_repo,
        }
    }

    /// Lists one page of a resource. `base_url` is the resource's own URL,
    /// used to build the navigation links.
    #[instrument(skip(self, base_url), fields(page = request.page(), per_page = request.per_page()))]
    pub async fn list_records(
        &self,
        resource: &str,
        request: PageRequest,
        base_url: &str,
    ) -> Result<Page<Record>, ApplicationError> {
        info!(resource = %resource, "Attempting to list records");
        validate_resource_name(resource)?;
        let records = self.record_repo.list(resource).await?;
        let page = paginate(&records, request, base_url);
        debug!(
            resource = %resource,
            total_items = page.metadata.total_items,
            returned = page.data.len(),
            "Page computed"
        );
        Ok(page)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_record(&self, resource: &str, id: RecordId) -> Result<Record, ApplicationError> {
        info!(resource = %resource, "Attempting to retrieve record");
        validate_resource_name(resource)?;
        self.record_repo
            .get(resource, id)
            .await?
            .ok_or_else(|| not_found(resource, id))
    }

    #[instrument(skip(self, body))]
    pub async fn create_record(&self, resource: &str, body: Value) -> Result<Record, ApplicationError> {
        info!(resource = %resource, "Attempting to create record");
        validate_resource_name(resource)?;
        let fields = self.check_against_schema(resource, body).await?;

        let record = self.record_repo.create(resource, fields).await.map_err(|e| {
            error!(resource = %resource, "Failed to create record: {}", e);
            e
        })?;
        info!(resource = %resource, id = %record.id(), "Record created successfully");
        Ok(record)
    }

    /// Full replacement: the body must satisfy the whole schema, `required`
    /// included. The id never changes.
    #[instrument(skip(self, body), fields(id = %id))]
    pub async fn update_record(
        &self,
        resource: &str,
        id: RecordId,
        body: Value,
    ) -> Result<Record, ApplicationError> {
        info!(resource = %resource, "Attempting to update record");
        validate_resource_name(resource)?;
        let fields = self.check_against_schema(resource, body).await?;

        let record = self
            .record_repo
            .update(resource, id, fields)
            .await?
            .ok_or_else(|| not_found(resource, id))?;
        info!(resource = %resource, "Record updated successfully");
        Ok(record)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_record(&self, resource: &str, id: RecordId) -> Result<Record, ApplicationError> {
        info!(resource = %resource, "Attempting to delete record");
        validate_resource_name(resource)?;
        let record = self
            .record_repo
            .delete(resource, id)
            .await?
            .ok_or_else(|| not_found(resource, id))?;
        info!(resource = %resource, "Record deleted successfully");
        Ok(record)
    }

    /// The validation gate in front of every mutation. Nothing reaches the
    /// repository unless this returns `Ok`.
    async fn check_against_schema(
        &self,
        resource: &str,
        body: Value,
    ) -> Result<Map<String, Value>, ApplicationError> {
        match self.schema_repo.get(resource).await? {
            Some(schema) => {
                if let Err(violations) = schema.validate(&body) {
                    warn!(
                        resource = %resource,
                        violations = violations.len(),
                        "Body failed schema validation"
                    );
                    return Err(ApplicationError::Validation(violations));
                }
                debug!(resource = %resource, "Body validated against schema");
            }
            None => debug!(resource = %resource, "No schema set, accepting any object"),
        }

        // Records are objects whatever the schema says.
        match body {
            Value::Object(fields) => Ok(fields),
            _ => {
                warn!(resource = %resource, "Rejected non-object body");
                Err(ApplicationError::InvalidInput(
                    "request body must be a JSON object".to_string(),
                ))
            }
        }
    }
}

fn not_found(resource: &str, id: RecordId) -> ApplicationError {
    warn!(resource = %resource, id = %id, "Record not found");
    ApplicationError::RecordNotFound {
        resource: resource.to_string(),
        id,
    }
}

#[cfg(test)]
mod tests;
