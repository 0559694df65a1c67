//! Domain error types.

use chrono::{DateTime, Utc};
use store::StoreError;
use thiserror::Error;

use crate::money::Money;
use crate::order::OrderStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The requested status change is not allowed.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The coupon is disabled.
    #[error("Coupon {code} is not active")]
    CouponInactive { code: String },

    /// The coupon has expired.
    #[error("Coupon {code} expired at {expired_at}")]
    CouponExpired {
        code: String,
        expired_at: DateTime<Utc>,
    },

    /// The order does not reach the coupon's minimum amount.
    #[error("Coupon {code} requires a minimum order of {minimum}")]
    CouponMinimumNotMet { code: String, minimum: Money },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
