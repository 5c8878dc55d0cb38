use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::schemas::ErrorResponse;

/// Field-keyed validation messages, serialized as the body of a 422.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors surfaced by the API handlers.
///
/// The `IntoResponse` impl below is the single place where error kinds
/// map to status codes and client-visible bodies. Detail for the 500
/// family is logged server-side and never echoed to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("user not authenticated")]
    Unauthenticated,
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("storage operation failed")]
    Storage(#[from] std::io::Error),
    #[error("credential hashing failed: {0}")]
    Credential(String),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "User not authenticated".to_string(),
                }),
            )
                .into_response(),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::Database(e) => {
                error!("Database error while handling request: {}", e);
                internal_error()
            }
            ApiError::Storage(e) => {
                error!("Storage error while handling request: {}", e);
                internal_error()
            }
            ApiError::Credential(e) => {
                error!("Credential hashing error while handling request: {}", e);
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "An unexpected error occurred".to_string(),
        }),
    )
        .into_response()
}
