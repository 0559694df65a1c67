//! Blocked customers.

use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::{Condition, Document};

/// A blocked phone number and/or email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockListEntry {
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BlockListEntry {
    pub const PHONE_FIELD: &'static str = "phone";
    pub const EMAIL_FIELD: &'static str = "email";
    pub const ACTIVE_FIELD: &'static str = "isActive";

    /// Creates an active entry blocking a phone number.
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            phone: Some(phone.into()),
            email: None,
            is_active: true,
            reason: None,
        }
    }

    /// Creates an active entry blocking an email address.
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            phone: None,
            email: Some(email.into()),
            is_active: true,
            reason: None,
        }
    }
}

impl Document for BlockListEntry {
    const COLLECTION: &'static str = "blocklist";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Number of trailing digits that identify a local phone number.
const LOCAL_DIGITS: usize = 11;

/// Builds the phone match variants: exact, digits only, last 11 digits,
/// and a suffix match on the last 11 digits.
pub fn phone_conditions(phone: &str) -> Vec<Condition> {
    let raw = phone.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let local = (digits.len() >= LOCAL_DIGITS).then(|| digits[digits.len() - LOCAL_DIGITS..].to_string());

    let mut exact: Vec<String> = vec![raw.to_string()];
    for variant in [Some(digits.clone()), local.clone()].into_iter().flatten() {
        if !variant.is_empty() && !exact.contains(&variant) {
            exact.push(variant);
        }
    }

    let mut conditions: Vec<Condition> = exact
        .into_iter()
        .map(|v| Condition::eq(BlockListEntry::PHONE_FIELD, v))
        .collect();
    if let Some(local) = local {
        conditions.push(Condition::ends_with(BlockListEntry::PHONE_FIELD, local));
    }
    conditions
}
