use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Concurrency conflict: expected version {expected}, current is {actual}")]
    ConcurrencyConflict { expected: i64, actual: i64 },

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Operation already applied")]
    DuplicateOperation,
}

impl OrderError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 401,
            Self::InvalidStateTransition { .. } => 409,
            Self::ConcurrencyConflict { .. } => 409,
            Self::Gateway(_) => 502,
            Self::DuplicateOperation => 200,
        }
    }

    /// Conflicts are expected under contention; the caller refetches and
    /// retries rather than escalating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::Gateway(_))
    }
}

/// User-visible failure shape for the outer transport layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub errors: Vec<String>,
}

impl From<&OrderError> for ErrorBody {
    fn from(err: &OrderError) -> Self {
        Self {
            status_code: err.status_code(),
            message: err.to_string(),
            errors: vec![err.to_string()],
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(OrderError::Validation("bad".into()).status_code(), 400);
        assert_eq!(OrderError::NotFound(Uuid::new_v4()).status_code(), 404);
        assert_eq!(OrderError::Unauthorized("nope".into()).status_code(), 401);
        assert_eq!(
            OrderError::InvalidStateTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled,
            }
            .status_code(),
            409
        );
        assert_eq!(
            OrderError::ConcurrencyConflict { expected: 1, actual: 2 }.status_code(),
            409
        );
        assert_eq!(OrderError::Gateway("timeout".into()).status_code(), 502);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OrderError::ConcurrencyConflict { expected: 1, actual: 2 }.is_retryable());
        assert!(OrderError::Gateway("timeout".into()).is_retryable());
        assert!(!OrderError::Validation("bad".into()).is_retryable());
        assert!(!OrderError::Unauthorized("nope".into()).is_retryable());
    }

    #[test]
    fn test_error_body_shape() {
        let err = OrderError::ConcurrencyConflict { expected: 3, actual: 5 };
        let body = ErrorBody::from(&err);

        assert_eq!(body.status_code, 409);
        assert!(body.message.contains("expected version 3"));
        assert_eq!(body.errors.len(), 1);

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"status_code\":409"));
    }
}
