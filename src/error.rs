use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::db::models::Role;
use crate::types::Cents;

const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

#[derive(Debug, ThisError)]
pub enum InvenError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Database migration error: {0}")]
    Schema(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing or invalid session token")]
    Unauthorized,

    #[error("Role {0} is not permitted to perform this action")]
    Forbidden(Role),

    #[error("{0}")]
    NotAllowed(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot add more than {available} of '{product}'")]
    InsufficientStock { product: String, available: i64 },

    #[error("Payment has already been made for transaction {0}")]
    PaymentAlreadyMade(i64),

    #[error("Insufficient payment: {remaining} still needed")]
    InsufficientPayment { remaining: Cents },

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl InvenError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        InvenError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        InvenError::NotFound(what.into())
    }

    /// Storage, I/O and runtime failures whose detail stays in the logs.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            InvenError::DatabaseError(_)
                | InvenError::Schema(_)
                | InvenError::Io(_)
                | InvenError::PasswordHash(_)
                | InvenError::RactorError(_)
        )
    }

    /// Text safe to show a client.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    /// True when the underlying SQLite error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            InvenError::DatabaseError(e) => e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl IntoResponse for InvenError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            InvenError::Validation { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION", self.to_string())
            }
            InvenError::InvalidCredentials | InvenError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            InvenError::Forbidden(_) | InvenError::NotAllowed(_) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string())
            }
            InvenError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            InvenError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", self.to_string()),
            InvenError::InsufficientStock { .. } => {
                (StatusCode::CONFLICT, "INSUFFICIENT_STOCK", self.to_string())
            }
            InvenError::PaymentAlreadyMade(_) => {
                (StatusCode::CONFLICT, "PAYMENT_ALREADY_MADE", self.to_string())
            }
            InvenError::InsufficientPayment { .. } => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_PAYMENT",
                self.to_string(),
            ),
            InvenError::Json(_) | InvenError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string())
            }
            InvenError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            InvenError::DatabaseError(_)
            | InvenError::Schema(_)
            | InvenError::Io(_)
            | InvenError::PasswordHash(_)
            | InvenError::RactorError(_) => {
                error!(error = %self, "internal error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
