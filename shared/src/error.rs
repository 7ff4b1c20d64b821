use lambda_http::{http::StatusCode, Body, Response};
use serde::Serialize;
use thiserror::Error;

use crate::response;

/// One rejected field from request validation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Everything a request can fail with.
///
/// The first four variants come out of the auth pipeline and are terminal for
/// the request. `PersistenceUnavailable` is an infrastructure failure and is
/// kept apart from `IdentityNotFound` so an outage never reads as "no such user".
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Invalid or expired token")]
    InvalidCredential,

    #[error("User not found")]
    IdentityNotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid request")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [FieldError]>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidCredential => StatusCode::FORBIDDEN,
            Self::IdentityNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PersistenceUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) | Self::Validation(_) | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind, used as the `error` field of the body
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MissingCredential",
            Self::InvalidCredential => "InvalidCredential",
            Self::IdentityNotFound => "IdentityNotFound",
            Self::Forbidden => "Forbidden",
            Self::PersistenceUnavailable(_) => "PersistenceUnavailable",
            Self::BadRequest(_) => "InvalidRequest",
            Self::Validation(_) => "ValidationFailed",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "Internal",
        }
    }

    /// Render as a JSON error response.
    ///
    /// Infrastructure details stay in the logs; the caller only sees a generic message.
    pub fn into_response(self) -> Response<Body> {
        let message = match &self {
            Self::PersistenceUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        let errors = match &self {
            Self::Validation(fields) => Some(fields.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
            errors,
        };
        response::json_or_fallback(self.status(), &body)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {err}"))
    }
}

impl From<lambda_http::http::Error> for ApiError {
    fn from(err: lambda_http::http::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Startup configuration problems
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_kinds_map_to_fixed_statuses() {
        assert_eq!(ApiError::MissingCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredential.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::IdentityNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::PersistenceUnavailable("timeout".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_outage_message_is_not_leaked() {
        let resp = ApiError::PersistenceUnavailable("dynamodb: connection reset".into())
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "PersistenceUnavailable");
        assert!(!body["message"].as_str().unwrap().contains("dynamodb"));
    }

    #[test]
    fn test_validation_body_lists_fields() {
        let resp = ApiError::Validation(vec![FieldError::new("email", "Invalid email")])
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["errors"][0]["field"], "email");
    }
}
