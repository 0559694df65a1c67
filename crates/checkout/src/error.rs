//! Checkout error types.

use common::DocumentId;
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can abort order placement or fail a background job.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or incomplete input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced product (or coupon) does not exist for the tenant.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A tracked product cannot cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: DocumentId,
        available: i64,
        requested: u32,
    },

    /// The customer matches an active block-list entry.
    #[error("Customer is blocked")]
    CustomerBlocked,

    /// Fraud-score service error.
    #[error("Fraud service error: {0}")]
    FraudService(String),

    /// Real-time channel error.
    #[error("Realtime channel error: {0}")]
    Realtime(String),

    /// Conversion tracking error.
    #[error("Conversion tracking error: {0}")]
    ConversionTracking(String),

    /// Email delivery failed on every provider.
    #[error("Email delivery failed: {0}")]
    Email(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Stable machine-readable kind, used in error bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation_error",
            CheckoutError::NotFound(_) => "not_found",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::CustomerBlocked => "customer_blocked",
            _ => "internal_error",
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Store(e) => CheckoutError::Store(e),
            DomainError::Serialization(e) => CheckoutError::Serialization(e),
            DomainError::CouponInactive { .. }
            | DomainError::CouponExpired { .. }
            | DomainError::CouponMinimumNotMet { .. } => CheckoutError::Validation(err.to_string()),
            other => CheckoutError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for CheckoutError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CheckoutError::Validation(errors.to_string())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(CheckoutError::Validation("x".into()).kind(), "validation_error");
        assert_eq!(CheckoutError::CustomerBlocked.kind(), "customer_blocked");
        assert_eq!(
            CheckoutError::Store(StoreError::Unavailable("orders".into())).kind(),
            "internal_error"
        );
    }

    #[test]
    fn coupon_errors_are_validation() {
        let err: CheckoutError = DomainError::CouponInactive {
            code: "SAVE10".into(),
        }
        .into();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }
}
