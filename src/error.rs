use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::status::OrderStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("missing or malformed actor identity: {0}")]
    Unauthenticated(String),

    #[error("no delivery partner available")]
    NoPartnerAvailable,

    #[error("order {order_id} already assigned to partner {partner_id}")]
    OrderAlreadyAssigned { order_id: Uuid, partner_id: Uuid },

    #[error("order {0} has no active assignment")]
    NoActiveAssignment(Uuid),

    #[error("order {order_id} was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        order_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::NoPartnerAvailable => "NO_PARTNER_AVAILABLE",
            AppError::OrderAlreadyAssigned { .. } => "ORDER_ALREADY_ASSIGNED",
            AppError::NoActiveAssignment(_) => "NO_ACTIVE_ASSIGNMENT",
            AppError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NoPartnerAvailable | AppError::ConcurrentModification { .. }
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NoPartnerAvailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::OrderAlreadyAssigned { .. }
            | AppError::NoActiveAssignment(_)
            | AppError::ConcurrentModification { .. }
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "retryable": self.is_retryable(),
        }));

        (self.status_code(), body).into_response()
    }
}
