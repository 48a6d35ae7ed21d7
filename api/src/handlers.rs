use crate::{AppState, ApiError};
use application::{ApplicationError, PageRequest};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header::HOST},
    response::{IntoResponse, Json as JsonResponse, Response},
};
use domain::RecordId;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// Raw pagination parameters; parsed leniently by [`PageRequest::from_query`].
#[derive(Deserialize, Debug, Default)]
pub(crate) struct PageParams {
    page: Option<String>,
    per_page: Option<String>,
}

type HandlerResult = Result<Response, ApiError>;

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|e| ApiError::Application(ApplicationError::from(e)))
}

/// The absolute (or, lacking any origin, path-only) URL of a resource.
fn resource_url(state: &AppState, headers: &HeaderMap, resource: &str) -> String {
    let origin = state.public_base_url.clone().or_else(|| {
        headers
            .get(HOST)
            .and_then(|host| host.to_str().ok())
            .map(|host| format!("http://{}", host))
    });
    format!("{}/{}", origin.unwrap_or_default(), resource)
}

// --- Schema Handlers ---

/// Handler for listing all schemas (GET /schemas).
pub(crate) async fn list_schemas_handler(State(state): State<AppState>) -> HandlerResult {
    info!("Received request to list schemas");
    let schemas = state.schema_service.list_schemas().await?;
    Ok((StatusCode::OK, JsonResponse(schemas)).into_response())
}

/// Handler for getting one schema (GET /schemas/:resource).
pub(crate) async fn get_schema_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> HandlerResult {
    info!(resource = %resource, "Received request to get schema");
    let schema = state.schema_service.get_schema(&resource).await?;
    Ok((StatusCode::OK, JsonResponse(schema)).into_response())
}

/// Handler for installing or replacing a schema (PUT /schemas/:resource).
pub(crate) async fn put_schema_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    info!(resource = %resource, "Received request to replace schema");
    let document = json_body(payload)?;
    let schema = state.schema_service.put_schema(&resource, document).await?;
    Ok((StatusCode::OK, JsonResponse(schema)).into_response())
}

// --- Resource Handlers ---

/// Handler for listing a page of records (GET /:resource?page&per_page).
pub(crate) async fn list_records_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    params: Result<Query<PageParams>, QueryRejection>,
) -> HandlerResult {
    // An unparseable query string behaves like an absent one
    let params = params.map(|Query(params)| params).unwrap_or_default();
    let request = PageRequest::from_query(params.page.as_deref(), params.per_page.as_deref());
    info!(
        resource = %resource,
        page = request.page(),
        per_page = request.per_page(),
        "Received request to list records"
    );

    let base_url = resource_url(&state, &headers, &resource);
    let page = state
        .resource_service
        .list_records(&resource, request, &base_url)
        .await?;
    Ok((StatusCode::OK, JsonResponse(page)).into_response())
}

/// Handler for getting one record (GET /:resource/:id).
pub(crate) async fn get_record_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> HandlerResult {
    info!(resource = %resource, id = %id, "Received request to get record");
    let id = parse_id(&id)?;
    let record = state.resource_service.get_record(&resource, id).await?;
    Ok((StatusCode::OK, JsonResponse(record)).into_response())
}

/// Handler for creating a record (POST /:resource).
pub(crate) async fn create_record_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    info!(resource = %resource, "Received request to create record");
    let body = json_body(payload)?;
    let record = state.resource_service.create_record(&resource, body).await?;
    Ok((StatusCode::CREATED, JsonResponse(record)).into_response())
}

/// Handler for replacing a record (PUT /:resource/:id).
pub(crate) async fn update_record_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    info!(resource = %resource, id = %id, "Received request to update record");
    let id = parse_id(&id)?;
    let body = json_body(payload)?;
    let record = state
        .resource_service
        .update_record(&resource, id, body)
        .await?;
    Ok((StatusCode::OK, JsonResponse(record)).into_response())
}

/// Handler for deleting a record (DELETE /:resource/:id). Returns the deleted record.
pub(crate) async fn delete_record_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> HandlerResult {
    info!(resource = %resource, id = %id, "Received request to delete record");
    let id = parse_id(&id)?;
    let record = state.resource_service.delete_record(&resource, id).await?;
    Ok((StatusCode::OK, JsonResponse(record)).into_response())
}
