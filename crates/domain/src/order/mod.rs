//! The order document and its building blocks.
//!
//! An order is created once by the checkout pipeline in [`OrderStatus::Pending`]
//! and afterwards only touched by merchant-side status changes and the
//! asynchronous fraud enrichment.

mod status;

pub use status::{OrderStatus, PaymentStatus};

use chrono::{DateTime, Utc};
use common::{DocumentId, TenantId};
use serde::{Deserialize, Serialize};
use store::Document;

use crate::error::DomainError;
use crate::fraud::FraudSnapshot;
use crate::money::Money;
use crate::pricing::OrderTotals;
use crate::tracking::SourceTracking;

/// Where the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderChannel {
    #[default]
    Online,
    Offline,
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    Card,
    MobileWallet,
    BankTransfer,
}

impl PaymentMethod {
    /// Returns true for cash-on-delivery orders.
    pub fn is_cash_on_delivery(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }
}

/// A single line item in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: DocumentId,
    pub name: String,
    /// Server-computed unit price after the product discount.
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl LineItem {
    /// Returns the line total (unit price times quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Customer details copied onto the order at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

/// The central order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: DocumentId,
    /// Human-readable code, e.g. `SHO-000042a1`.
    pub order_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub channel: OrderChannel,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping: Money,
    pub vat_tax_amount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub customer: CustomerSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_commission: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_check: Option<FraudSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tracking: Option<SourceTracking>,
}

impl Order {
    /// Field name of the fraud snapshot in the stored document.
    pub const FRAUD_CHECK_FIELD: &'static str = "fraudCheck";

    /// Builds a new pending order from priced line items.
    pub fn new(
        order_code: impl Into<String>,
        items: Vec<LineItem>,
        totals: OrderTotals,
        payment_method: PaymentMethod,
        customer: CustomerSnapshot,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DocumentId::new(),
            order_code: order_code.into(),
            created_at: now,
            updated_at: now,
            status: OrderStatus::Pending,
            channel: OrderChannel::Online,
            items,
            subtotal: totals.subtotal,
            discount_amount: totals.discount,
            shipping: totals.shipping,
            vat_tax_amount: totals.vat,
            total: totals.total,
            payment_method,
            payment_status: PaymentStatus::Pending,
            customer,
            coupon_code: None,
            affiliate_code: None,
            affiliate_id: None,
            affiliate_commission: None,
            fraud_check: None,
            source_tracking: None,
        }
    }

    /// Returns true if `total == subtotal - discount + vat + shipping`.
    pub fn verify_total(&self) -> bool {
        self.total == self.subtotal - self.discount_amount + self.vat_tax_amount + self.shipping
    }

    /// Status to show to users.
    ///
    /// A failed or cancelled payment displays as `Cancelled`. The stored
    /// `status` is left untouched.
    pub fn effective_status(&self) -> OrderStatus {
        if self.payment_status.voids_order() {
            OrderStatus::Cancelled
        } else {
            self.status
        }
    }

    /// Moves the order to a new status if the transition is legal.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Total number of units across all line items.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Derives the order-code prefix for a tenant.
///
/// Uses the configured prefix if present, else the first three
/// alphanumeric characters of the tenant id, else `ORD`.
pub fn derive_code_prefix(configured: Option<&str>, tenant: &TenantId) -> String {
    if let Some(prefix) = configured.map(str::trim)
        && !prefix.is_empty()
    {
        return prefix.to_uppercase();
    }

    let derived: String = tenant
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();

    if derived.is_empty() {
        "ORD".to_string()
    } else {
        derived
    }
}

/// Formats a human-readable order code: `{PREFIX}-{seq:06}{suffix}`.
pub fn format_order_code(prefix: &str, sequence: u64, suffix: &str) -> String {
    format!("{prefix}-{sequence:06}{suffix}")
}

/// Two random hex characters appended to order codes.
pub fn random_code_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..2].to_string()
}
