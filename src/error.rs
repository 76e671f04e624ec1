// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// A single rejected field in an administrative update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {}", summarize(.0))]
    BadParameters(Vec<FieldError>),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AnalyticsError {
    pub fn bad_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        AnalyticsError::BadParameters(vec![FieldError::new(field, message)])
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Internal(err.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AnalyticsError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "NOT_FOUND", "message": msg }),
            ),
            AnalyticsError::BadParameters(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "BAD_PARAMETERS",
                    "message": "One or more fields are invalid",
                    "fields": errors,
                }),
            ),
            AnalyticsError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "FORBIDDEN", "message": msg }),
            ),
            AnalyticsError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "UNAUTHORIZED", "message": msg }),
            ),
            // Persistence details stay in the logs.
            AnalyticsError::Store(err) => {
                tracing::error!("Store failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "INTERNAL_ERROR", "message": "Internal server error" }),
                )
            }
            AnalyticsError::Internal(err) => {
                tracing::error!("Internal failure: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "INTERNAL_ERROR", "message": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
