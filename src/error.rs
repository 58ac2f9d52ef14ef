use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;
use crate::store::StoreError;

/// One invalid field of a zone form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller-correctable input problems.
    Validation,
    /// Expected under concurrent use; refresh or pick another rider.
    Contention,
    /// Illegal state change requested; a caller bug.
    Transition,
    System,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid zone field {}: {}", .0.field, .0.message)]
    InvalidZoneField(FieldError),

    #[error("zone has {} invalid field(s)", .0.len())]
    ZoneValidation(Vec<FieldError>),

    #[error("a failure reason is required")]
    MissingFailureReason,

    #[error("rider {0} is not available")]
    RiderUnavailable(Uuid),

    #[error("order {0} already has an active assignment")]
    AlreadyAssigned(Uuid),

    #[error("order {0} was already delivered")]
    OrderAlreadyDelivered(Uuid),

    #[error("assignment {0} changed concurrently")]
    StatusConflict(Uuid),

    #[error("assignment {id} is already {status}")]
    AssignmentAlreadyTerminal { id: Uuid, status: AssignmentStatus },

    #[error("cannot move assignment from {from} to {to}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("no delivery zone matched order {0}")]
    ZoneNotResolved(Uuid),

    #[error("could not generate a unique tracking code after {0} attempts")]
    TrackingCodeExhausted(u32),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InvalidZoneField(_)
            | AppError::ZoneValidation(_)
            | AppError::MissingFailureReason
            | AppError::ZoneNotResolved(_)
            | AppError::NotFound(_)
            | AppError::BadRequest(_) => ErrorCategory::Validation,
            AppError::RiderUnavailable(_)
            | AppError::AlreadyAssigned(_)
            | AppError::OrderAlreadyDelivered(_)
            | AppError::StatusConflict(_) => ErrorCategory::Contention,
            AppError::AssignmentAlreadyTerminal { .. } | AppError::InvalidTransition { .. } => {
                ErrorCategory::Transition
            }
            AppError::TrackingCodeExhausted(_) | AppError::Store(_) | AppError::Internal(_) => {
                ErrorCategory::System
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidZoneField(_) | AppError::ZoneValidation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::MissingFailureReason
            | AppError::ZoneNotResolved(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RiderUnavailable(_)
            | AppError::AlreadyAssigned(_)
            | AppError::OrderAlreadyDelivered(_)
            | AppError::StatusConflict(_)
            | AppError::AssignmentAlreadyTerminal { .. }
            | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::TrackingCodeExhausted(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.category();

        let body = match &self {
            AppError::ZoneValidation(fields) => json!({
                "error": self.to_string(),
                "category": category,
                "fields": fields,
            }),
            AppError::InvalidZoneField(field) => json!({
                "error": self.to_string(),
                "category": category,
                "fields": [field],
            }),
            _ => json!({
                "error": self.to_string(),
                "category": category,
            }),
        };

        (status, Json(body)).into_response()
    }
}
