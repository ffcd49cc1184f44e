//! Error types for HTTP handlers.
//!
//! Domain errors are mapped to a status, a stable machine-readable code and
//! a message, rendered as `{"code": "...", "message": "..."}`. Server errors
//! are logged with their source; client errors are not.

use crate::auth::SessionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatepass_core::gate::GateError;
use gatepass_core::inventory::{LedgerError, LedgerRejection};
use gatepass_core::orders::OrderError;
use gatepass_core::store::StoreError;
use serde::Serialize;
use std::fmt;

/// Application error returned by handlers
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error, logged for server errors.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 400 Bad Request
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 401 Unauthorized
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 404 Not Found
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} {id} not found"),
        )
    }

    /// 409 Conflict
    #[must_use]
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    /// 422 Unprocessable Entity
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 500 Internal Server Error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message,
        )
    }

    /// 503 Service Unavailable
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            message,
        )
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

// ============================================================================
// Domain error mapping
// ============================================================================

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => {
                Self::unavailable("Service temporarily unavailable, please retry").with_source(err)
            },
            StoreError::Conflict(_) => Self::conflict("CONFLICT", err.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => {
                Self::internal("An internal error occurred").with_source(err)
            },
        }
    }
}

fn rejection(rejection: LedgerRejection, message: String) -> AppError {
    match rejection {
        LedgerRejection::CapacityExceeded { .. } => AppError::conflict("SOLD_OUT", message),
        LedgerRejection::ManualCapReached { .. } => {
            AppError::conflict("MANUAL_CAP_REACHED", message)
        },
        LedgerRejection::UnknownTier => {
            AppError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
        },
        LedgerRejection::ZeroQuantity => AppError::validation(message),
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(ref number) => Self::not_found("Order", number),
            OrderError::UnknownTier(ref tier) => Self::not_found("Tier", tier),
            OrderError::InvalidRequest(_) => Self::validation(err.to_string()),
            OrderError::AmountMismatch { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "AMOUNT_MISMATCH", err.to_string())
            },
            OrderError::InvalidTransition { .. } => {
                Self::conflict("INVALID_TRANSITION", err.to_string())
            },
            OrderError::Inventory { rejection: r, .. } => rejection(r, err.to_string()),
            OrderError::CodeCollisions(_) => {
                Self::unavailable("Could not issue tickets, please retry").with_source(err)
            },
            OrderError::Pricing(_) => Self::internal("Could not price the order").with_source(err),
            OrderError::Store(store) => store.into(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected { rejection: r, .. } => rejection(r, err.to_string()),
            LedgerError::UnknownTier(tier) => Self::not_found("Tier", tier),
            LedgerError::Store(store) => store.into(),
        }
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Store(store) => store.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", err.to_string())
            },
            SessionError::Expired => {
                Self::new(StatusCode::UNAUTHORIZED, "SESSION_EXPIRED", err.to_string())
            },
            SessionError::Missing | SessionError::Malformed | SessionError::BadSignature => {
                Self::unauthorized(err.to_string())
            },
        }
    }
}
