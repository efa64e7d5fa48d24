use std::fmt::Display;

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use rewear_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthorized,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn field(field: &'static str, message: impl Display) -> Self {
        Self::Validation {
            field,
            message: message.to_string(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(message) => Self::Validation {
                field: "non_field_errors",
                message,
            },
            CoreError::PermissionDenied(message) => Self::PermissionDenied(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        Self::field("body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "detail": message, "field": field }),
            ),
            Self::InvalidCredentials => (StatusCode::BAD_REQUEST, json!({ "detail": self.to_string() })),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "detail": self.to_string() })),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, json!({ "detail": self.to_string() })),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "detail": self.to_string() })),
            Self::Conflict(_) => (StatusCode::CONFLICT, json!({ "detail": self.to_string() })),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal server error." }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections render as `ApiError` validation bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
