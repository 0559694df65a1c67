//! Order and payment status state machines.

use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// State transitions:
/// ```text
/// Pending ──► WaitingForConfirmation ──► Confirmed ──► Processing ──┬──► Restocking ──┐
///                                                                  └────────────────┴──► Packed
/// Packed ──► SentToLogistics ──► Shipped ──► Delivered
///
/// any non-terminal state ──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial state assigned at creation, regardless of payment method.
    #[default]
    Pending,
    WaitingForConfirmation,
    Confirmed,
    Processing,
    /// Optional detour while stock is replenished.
    Restocking,
    Packed,
    SentToLogistics,
    Shipped,
    /// Terminal.
    Delivered,
    /// Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }

        matches!(
            (self, next),
            (Pending, WaitingForConfirmation)
                | (WaitingForConfirmation, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Restocking)
                | (Processing, Packed)
                | (Restocking, Packed)
                | (Packed, SentToLogistics)
                | (SentToLogistics, Shipped)
                | (Shipped, Delivered)
        )
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::WaitingForConfirmation => "waiting_for_confirmation",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Restocking => "restocking",
            OrderStatus::Packed => "packed",
            OrderStatus::SentToLogistics => "sent_to_logistics",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status, an axis independent from [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Returns true if the payment outcome voids the order for display purposes.
    pub fn voids_order(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled)
    }
}
