//! Data model for the order placement pipeline.
//!
//! This crate provides:
//! - Money and pricing math (subtotal, discount, VAT, shipping, total)
//! - Order, line items, and the order / payment status state machines
//! - Stock ledger entries
//! - Affiliates, the tiered commission table, and commission records
//! - Block-list entries, staff users, notifications
//! - Fraud snapshots, source tracking, coupons, and store settings

pub mod affiliate;
pub mod blocklist;
pub mod error;
pub mod fraud;
pub mod inventory;
pub mod money;
pub mod notification;
pub mod order;
pub mod pricing;
pub mod product;
pub mod settings;
pub mod tracking;

pub use affiliate::{
    Affiliate, AffiliateSettings, AffiliateStatus, CommissionRecord, CommissionStatus,
    CommissionTier,
};
pub use blocklist::{BlockListEntry, phone_conditions};
pub use error::DomainError;
pub use fraud::{CourierStat, FraudReport, FraudSnapshot, RiskTier};
pub use inventory::{StockLedgerEntry, TransactionType};
pub use money::Money;
pub use notification::{Notification, NotificationKind, StaffRole, StaffUser};
pub use order::{
    CustomerSnapshot, LineItem, Order, OrderChannel, OrderStatus, PaymentMethod, PaymentStatus,
    derive_code_prefix, format_order_code, random_code_suffix,
};
pub use pricing::OrderTotals;
pub use product::Product;
pub use settings::{Coupon, CouponKind, StoreSettings};
pub use tracking::SourceTracking;
