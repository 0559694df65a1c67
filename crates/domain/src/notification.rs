//! Staff users and the in-app notifications fanned out to them.

use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::Document;

use crate::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Merchant,
    Admin,
    Staff,
    Customer,
}

impl StaffRole {
    /// Roles that receive new-order notifications and alert emails.
    pub const ORDER_RECIPIENTS: [StaffRole; 2] = [StaffRole::Merchant, StaffRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Merchant => "merchant",
            StaffRole::Admin => "admin",
            StaffRole::Staff => "staff",
            StaffRole::Customer => "customer",
        }
    }
}

/// A user account scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUser {
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: StaffRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl StaffUser {
    pub const ROLE_FIELD: &'static str = "role";

    pub fn new(name: impl Into<String>, email: impl Into<String>, role: StaffRole) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            email: Some(email.into()),
            role,
            is_active: true,
        }
    }
}

impl Document for StaffUser {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    LowStock,
    System,
}

/// One notification for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: DocumentId,
    pub user_id: DocumentId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds the new-order notification for one staff user.
    pub fn new_order(user_id: DocumentId, order: &Order) -> Self {
        Self {
            id: DocumentId::new(),
            user_id,
            title: "New order received".to_string(),
            message: format!(
                "Order {} from {} for {}",
                order.order_code, order.customer.name, order.total
            ),
            kind: NotificationKind::NewOrder,
            read: false,
            link: Some(format!("/orders/{}", order.id)),
            created_at: Utc::now(),
        }
    }
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> DocumentId {
        self.id
    }
}
