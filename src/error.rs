//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used by every handler.
//! Lower layers (repository, blob store, credentials) have their own error enums;
//! `From` conversions let handlers bubble them up with the `?` operator.
//!
//! `AppError` implements `actix_web::error::ResponseError` so each variant turns
//! into the matching HTTP status with a JSON body. Internal failures are logged
//! with their detail but only a generic message reaches the client.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::auth::password::CredentialError;
use crate::auth::token::TokenError;
use crate::blob::BlobError;
use crate::store::StoreError;

/// A single field-level validation failure, rendered as `{path, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub error: String,
}

/// Represents all possible errors surfaced by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input failed schema validation (HTTP 400).
    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),
    /// Malformed request that is not a field validation issue (HTTP 400),
    /// e.g. an unsupported upload type or an unreadable multipart body.
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Missing, invalid or expired credentials (HTTP 401).
    ///
    /// `expired_at` is set when the token was well-formed but past its expiry,
    /// so clients can tell "log in again" apart from "fix the request".
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        details: Option<String>,
        expired_at: Option<DateTime<Utc>>,
    },
    /// Authenticated, but the caller does not own the resource (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The requested resource does not exist (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// A uniqueness rule was violated (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Persistence, blob store or other server-side failure (HTTP 500).
    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// Plain 401 with the message every auth failure shares.
    pub fn unauthorized() -> Self {
        AppError::Unauthorized {
            message: "User is not authorized".into(),
            details: None,
            expired_at: None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::Validation(errors) => HttpResponse::build(status).json(json!({
                "error": "Validation failed",
                "errors": errors,
            })),
            AppError::Unauthorized {
                message,
                details,
                expired_at,
            } => {
                let mut body = json!({ "error": message });
                if let Some(expired_at) = expired_at {
                    body["expiredAt"] = json!(expired_at);
                }
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                HttpResponse::build(status).json(body)
            }
            AppError::Internal(detail) => {
                // The detail stays in the logs; clients only get the generic message.
                log::error!("internal error: {}", detail);
                HttpResponse::build(status).json(json!({ "error": "Internal server error" }))
            }
            AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => HttpResponse::build(status).json(json!({ "error": msg })),
        }
    }
}

/// Flattens `validator` errors (including nested structs) into `{path, error}` pairs.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        AppError::Validation(fields)
    }
}

fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", err.code));
                    out.push(FieldError {
                        path: path.clone(),
                        error: message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{}.{}", path, index), inner, out);
                }
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Unavailable(detail) => AppError::Internal(format!("store: {}", detail)),
        }
    }
}

impl From<BlobError> for AppError {
    fn from(error: BlobError) -> AppError {
        match error {
            BlobError::Unavailable(detail) => AppError::Internal(format!("blob store: {}", detail)),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(error: CredentialError) -> AppError {
        AppError::Internal(error.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::Expired { expired_at } => AppError::Unauthorized {
                message: "User is not authorized".into(),
                details: None,
                expired_at: Some(expired_at),
            },
            TokenError::Invalid(reason) => AppError::Unauthorized {
                message: "User is not authorized".into(),
                details: Some(reason),
                expired_at: None,
            },
            TokenError::Signing(detail) => AppError::Internal(detail),
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(error: actix_web::error::BlockingError) -> AppError {
        AppError::Internal(format!("blocking task failed: {}", error))
    }
}
