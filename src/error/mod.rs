// Error handling for the account API
// Provides the typed failure tree, the classified error shape and HTTP conversion

mod classify;
mod signature;

pub use classify::classify;
pub use signature::{Signature, ValidatedField};

use crate::auth::{error::AuthError, models::ParseUserIdError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

/// Client-facing message for every 5xx response
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Closed set of stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DuplicateIdentity,
    BadRequest,
    NotFound,
    Unauthorized,
    Forbidden,
    RequestTimeout,
    InternalFailure,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateIdentity => "DUPLICATE_IDENTITY",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::InternalFailure => "INTERNAL_FAILURE",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::DuplicateIdentity | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final `(status, code, causes)` shape of any failure.
///
/// Serialises as `{status, error, data}`. `causes` is diagnostic and may hold
/// internal detail for 5xx errors; [`IntoResponse`] strips it before sending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassifiedError {
    #[schema(example = 400)]
    pub status: u16,
    #[serde(rename = "error")]
    pub code: ErrorCode,
    #[serde(rename = "data")]
    #[schema(value_type = Option<Object>)]
    pub causes: Option<Value>,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, causes: Option<Value>) -> Self {
        Self {
            status: code.status().as_u16(),
            code,
            causes,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, Some(json!({ "message": message.into() })))
    }

    pub fn duplicate_identity() -> Self {
        Self::with_message(ErrorCode::DuplicateIdentity, "username or email already exists")
    }

    /// 500 with the raw cause kept for server-side logging
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InternalFailure,
            Some(json!({ "message": INTERNAL_MESSAGE, "cause": cause.to_string() })),
        )
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// The body a client is allowed to see
    pub fn public(&self) -> ClassifiedError {
        if self.is_server_error() {
            Self {
                status: self.status,
                code: self.code,
                causes: Some(json!({ "message": INTERNAL_MESSAGE })),
            }
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.causes {
            Some(causes) => write!(
                f,
                "status: {} - error: {} - causes: {}",
                self.status, self.code, causes
            ),
            None => write!(f, "status: {} - error: {}", self.status, self.code),
        }
    }
}

impl std::error::Error for ClassifiedError {}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!("Request failed: {}", self);
        } else if self.code == ErrorCode::Unauthorized {
            warn!("Unauthorized request: {}", self);
        } else {
            debug!("Client error: {}", self);
        }

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.public())).into_response()
    }
}

/// Any failure that can reach the HTTP boundary
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Field validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("failed to deserialize request body: {0}")]
    Deserialize(String),

    #[error(transparent)]
    MalformedId(#[from] ParseUserIdError),

    /// Already classified; passes through unchanged
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// Opaque failure from a collaborator we do not own, known only by its message
    #[error("{0}")]
    Foreign(String),
}

impl AppError {
    pub fn foreign(err: impl fmt::Display) -> Self {
        AppError::Foreign(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Deserialize(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        classify(&self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let expected = [
            (ErrorCode::DuplicateIdentity, 400),
            (ErrorCode::BadRequest, 400),
            (ErrorCode::NotFound, 404),
            (ErrorCode::Unauthorized, 401),
            (ErrorCode::Forbidden, 403),
            (ErrorCode::RequestTimeout, 408),
            (ErrorCode::InternalFailure, 500),
        ];
        for (code, status) in expected {
            assert_eq!(code.status().as_u16(), status);
            assert_eq!(ClassifiedError::new(code, None).status, status);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let err = ClassifiedError::duplicate_identity();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            json!({
                "status": 400,
                "error": "DUPLICATE_IDENTITY",
                "data": { "message": "username or email already exists" }
            })
        );
    }

    #[test]
    fn test_code_strings_match_serde() {
        for code in [
            ErrorCode::DuplicateIdentity,
            ErrorCode::BadRequest,
            ErrorCode::NotFound,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::RequestTimeout,
            ErrorCode::InternalFailure,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }

    #[test]
    fn test_public_view_redacts_internal_cause() {
        let err = ClassifiedError::internal("password column missing");
        assert!(err.to_string().contains("password column missing"));

        let public = err.public();
        assert_eq!(public.code, ErrorCode::InternalFailure);
        assert_eq!(public.causes, Some(json!({ "message": INTERNAL_MESSAGE })));
    }

    #[test]
    fn test_public_view_keeps_client_errors() {
        let err = ClassifiedError::with_message(ErrorCode::Forbidden, "forbidden");
        assert_eq!(err.public(), err);
    }
}
