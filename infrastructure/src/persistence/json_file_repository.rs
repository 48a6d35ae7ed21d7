//! JSON-file storage: one pretty-printed file per resource.
//!
//! Records live in `<root>/data/<resource>.json` as an array, schemas in
//! `<root>/schemas/<resource>.json`. Every file is replaced through a
//! temporary file and a rename, so readers never see a partial document.

use super::collection::Collection;
use application::{ApplicationError, RecordRepository, SchemaRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use domain::{Record, RecordId, SchemaDocument};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

const RECORDS_DIR: &str = "data";
const SCHEMAS_DIR: &str = "schemas";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn io_error(context: &str, path: &Path, err: std::io::Error) -> ApplicationError {
    error!(path = %path.display(), "{}: {}", context, err);
    ApplicationError::InfrastructureError(format!("{} '{}': {}", context, path.display(), err))
}

fn json_error(context: &str, path: &Path, err: serde_json::Error) -> ApplicationError {
    error!(path = %path.display(), "{}: {}", context, err);
    ApplicationError::InfrastructureError(format!("{} '{}': {}", context, path.display(), err))
}

async fn ensure_dir(path: &Path) -> Result<(), ApplicationError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("Failed to create directory", path, e))
}

/// Reads `path`, returning `None` if it does not exist.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ApplicationError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("Failed to read file", path, e)),
    }
}

async fn write_atomically(path: &Path, bytes: Vec<u8>) -> Result<(), ApplicationError> {
    let tmp = path.with_extension(format!(
        "json.{}.tmp",
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_error("Failed to write file", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        // Best effort cleanup; the original error is what matters
        let _ = fs::remove_file(&tmp).await;
        return Err(io_error("Failed to replace file", path, e));
    }
    Ok(())
}

fn resource_file(dir: &Path, resource: &str) -> PathBuf {
    dir.join(format!("{}.json", resource))
}

// --- Schema Repository Implementation ---

#[derive(Debug, Clone)]
pub struct JsonFileSchemaRepository {
    dir: PathBuf,
}

impl JsonFileSchemaRepository {
    /// Opens (creating if needed) the schema directory under `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ApplicationError> {
        let dir = root.as_ref().join(SCHEMAS_DIR);
        ensure_dir(&dir).await?;
        info!(dir = %dir.display(), "Schema directory ready");
        Ok(Self { dir })
    }
}

#[async_trait]
impl SchemaRepository for JsonFileSchemaRepository {
    #[instrument(skip(self))]
    async fn get(&self, resource: &str) -> Result<Option<SchemaDocument>, ApplicationError> {
        let path = resource_file(&self.dir, resource);
        debug!(path = %path.display(), "Reading schema file");
        match read_optional(&path).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| json_error("Stored schema is not valid", &path, e)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, schema))]
    async fn save(&self, resource: &str, schema: &SchemaDocument) -> Result<(), ApplicationError> {
        let path = resource_file(&self.dir, resource);
        debug!(path = %path.display(), "Writing schema file");
        let bytes = serde_json::to_vec_pretty(schema)
            .map_err(|e| json_error("Failed to serialize schema", &path, e))?;
        write_atomically(&path, bytes).await
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<BTreeMap<String, SchemaDocument>, ApplicationError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error("Failed to list directory", &self.dir, e))?;
        let mut schemas = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("Failed to list directory", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(resource) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.get(resource).await {
                Ok(Some(schema)) => {
                    schemas.insert(resource.to_string(), schema);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), "Skipping unreadable schema: {}", e),
            }
        }
        Ok(schemas)
    }
}

// --- Record Repository Implementation ---

/// Write-through record storage. Each mutation is staged on a copy of the
/// collection, written to disk, and only then made visible, all while the
/// resource's write lock is held.
#[derive(Debug, Clone)]
pub struct JsonFileRecordRepository {
    dir: PathBuf,
    // Resource Name -> records loaded from disk, each behind its own lock
    store: Arc<DashMap<String, Arc<RwLock<Collection>>>>,
}

impl JsonFileRecordRepository {
    /// Opens (creating if needed) the record directory under `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ApplicationError> {
        let dir = root.as_ref().join(RECORDS_DIR);
        ensure_dir(&dir).await?;
        info!(dir = %dir.display(), "Record directory ready");
        Ok(Self {
            dir,
            store: Arc::new(DashMap::new()),
        })
    }

    async fn read_records(&self, resource: &str) -> Result<Option<Vec<Record>>, ApplicationError> {
        let path = resource_file(&self.dir, resource);
        match read_optional(&path).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| json_error("Stored records are not valid", &path, e)),
            None => Ok(None),
        }
    }

    fn register(&self, resource: &str, records: Vec<Record>) -> Arc<RwLock<Collection>> {
        debug!(resource = %resource, count = records.len(), "Loaded collection from disk");
        // A concurrent loader may have won; its copy is identical since no
        // write can happen before the collection is registered.
        self.store
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Collection::from_records(records))))
            .value()
            .clone()
    }

    /// Returns the collection for `resource`, loading it from disk or
    /// creating it empty on first use.
    async fn collection(&self, resource: &str) -> Result<Arc<RwLock<Collection>>, ApplicationError> {
        if let Some(collection) = self.store.get(resource) {
            return Ok(collection.value().clone());
        }
        let records = self.read_records(resource).await?.unwrap_or_default();
        Ok(self.register(resource, records))
    }

    /// Like [`Self::collection`], but a resource with no file stays
    /// unregistered so reads of unknown names leave the map untouched.
    async fn existing(
        &self,
        resource: &str,
    ) -> Result<Option<Arc<RwLock<Collection>>>, ApplicationError> {
        if let Some(collection) = self.store.get(resource) {
            return Ok(Some(collection.value().clone()));
        }
        Ok(self
            .read_records(resource)
            .await?
            .map(|records| self.register(resource, records)))
    }

    async fn persist(&self, resource: &str, collection: &Collection) -> Result<(), ApplicationError> {
        let path = resource_file(&self.dir, resource);
        let bytes = serde_json::to_vec_pretty(&collection.records())
            .map_err(|e| json_error("Failed to serialize records", &path, e))?;
        write_atomically(&path, bytes).await?;
        debug!(resource = %resource, count = collection.len(), "Collection written to disk");
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for JsonFileRecordRepository {
    #[instrument(skip(self))]
    async fn list(&self, resource: &str) -> Result<Vec<Record>, ApplicationError> {
        let Some(collection) = self.existing(resource).await? else {
            return Ok(Vec::new());
        };
        let records = collection.read().await.records();
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        let Some(collection) = self.existing(resource).await? else {
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
        let collection = self.collection(resource).await?;
        let mut guard = collection.write().await;
        let mut staged = guard.clone();
        let record = staged.insert(fields);
        self.persist(resource, &staged).await?;
        *guard = staged;
        Ok(record)
    }

    #[instrument(skip(self, fields))]
    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, ApplicationError> {
        let Some(collection) = self.existing(resource).await? else {
            return Ok(None);
        };
        let mut guard = collection.write().await;
        let mut staged = guard.clone();
        let Some(record) = staged.update(id, fields) else {
            return Ok(None);
        };
        self.persist(resource, &staged).await?;
        *guard = staged;
        Ok(Some(record))
    }

    #[instrument(skip(self))]
    async fn delete(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        let Some(collection) = self.existing(resource).await? else {
            return Ok(None);
        };
        let mut guard = collection.write().await;
        let mut staged = guard.clone();
        let Some(record) = staged.remove(id) else {
            return Ok(None);
        };
        self.persist(resource, &staged).await?;
        *guard = staged;
        Ok(Some(record))
    }
}
