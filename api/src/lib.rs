// ./api/src/lib.rs
use application::{
    ApplicationError, RecordRepository, ResourceService, SchemaRepository, SchemaService,
};
use axum::{
    Router,
    routing::get,
};
use infrastructure::{
    InMemoryRecordRepository, InMemorySchemaRepository, JsonFileRecordRepository,
    JsonFileSchemaRepository,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod config;
pub mod error;
mod handlers;

pub use config::Config;
pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub schema_service: Arc<SchemaService>,
    pub resource_service: Arc<ResourceService>,
    /// Origin for pagination links; falls back to the request's Host header.
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(
        schema_repository: Arc<dyn SchemaRepository>,
        record_repository: Arc<dyn RecordRepository>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            schema_service: Arc::new(SchemaService::new(schema_repository.clone())),
            resource_service: Arc::new(ResourceService::new(
                schema_repository,
                record_repository,
            )),
            public_base_url,
        }
    }

    /// Wires storage and services according to `config`, seeding the
    /// built-in schemas when enabled.
    pub async fn from_config(config: &Config) -> Result<Self, ApplicationError> {
        let (schema_repository, record_repository): (
            Arc<dyn SchemaRepository>,
            Arc<dyn RecordRepository>,
        ) = match &config.data_dir {
            Some(dir) => {
                info!(data_dir = %dir.display(), "Using JSON file storage");
                (
                    Arc::new(JsonFileSchemaRepository::open(dir).await?),
                    Arc::new(JsonFileRecordRepository::open(dir).await?),
                )
            }
            None => {
                info!("Using in-memory storage");
                (
                    Arc::new(InMemorySchemaRepository::new()),
                    Arc::new(InMemoryRecordRepository::new()),
                )
            }
        };

        let state = Self::new(
            schema_repository,
            record_repository,
            config.public_base_url.clone(),
        );
        if config.seed_default_schemas {
            state.schema_service.seed_defaults().await?;
        }
        Ok(state)
    }
}

/// Builds the HTTP surface. Any first path segment other than `schemas` is
/// a resource name; nothing is registered per resource.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Schema Management Endpoints
        .route("/schemas", get(handlers::list_schemas_handler))
        .route(
            "/schemas/:resource",
            get(handlers::get_schema_handler).put(handlers::put_schema_handler),
        )
        // Generic Resource Endpoints
        .route(
            "/:resource",
            get(handlers::list_records_handler).post(handlers::create_record_handler),
        )
        .route(
            "/:resource/:id",
            get(handlers::get_record_handler)
                .put(handlers::update_record_handler)
                .delete(handlers::delete_record_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
