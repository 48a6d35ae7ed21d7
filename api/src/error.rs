use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    /// Request could not be decoded (malformed JSON, wrong content type).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Application(err) => map_application_error_to_response(err),
            ApiError::BadRequest(msg) => {
                warn!("Rejected malformed request: {}", msg);
                error_response(StatusCode::BAD_REQUEST, json!(msg))
            }
        }
    }
}

fn error_response(status: StatusCode, error: Value) -> Response {
    (status, JsonResponse(json!({ "error": error }))).into_response()
}

/// Maps ApplicationError variants to HTTP status codes and `{"error": ...}` bodies.
/// Validation errors carry every violation; internal faults carry nothing
/// beyond a generic message.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    match err {
        ApplicationError::RecordNotFound { .. } | ApplicationError::SchemaNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, json!(err.to_string()))
        }
        ApplicationError::Validation(violations) => {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            error_response(StatusCode::BAD_REQUEST, json!(messages))
        }
        ApplicationError::InvalidInput(msg) => error_response(StatusCode::BAD_REQUEST, json!(msg)),
        ApplicationError::DomainError(domain_err) => {
            // Bad resource names, record ids or schema documents
            warn!("Domain validation failed: {}", domain_err);
            error_response(StatusCode::BAD_REQUEST, json!(domain_err.to_string()))
        }
        ApplicationError::InfrastructureError(msg) => {
            error!("Underlying infrastructure error: {}", msg);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!("An internal server error occurred"),
            )
        }
    }
}
