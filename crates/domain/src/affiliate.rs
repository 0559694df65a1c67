//! Affiliates, the tiered commission table, and commission records.

use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::Document;

use crate::money::Money;

/// Lifecycle status of an affiliate. Only `Active` affiliates earn commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

/// A referral partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliate {
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Stored uppercased.
    pub promo_code: String,
    pub status: AffiliateStatus,
    /// Commission level, maintained from delivered-sales history.
    #[serde(default = "default_tier")]
    pub tier: u32,
    #[serde(default)]
    pub total_orders: i64,
}

fn default_tier() -> u32 {
    1
}

impl Affiliate {
    /// Field holding the attributed order counter.
    pub const TOTAL_ORDERS_FIELD: &'static str = "totalOrders";

    /// Creates an active tier-1 affiliate.
    pub fn new(name: impl Into<String>, promo_code: impl AsRef<str>) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            email: None,
            promo_code: promo_code.as_ref().trim().to_uppercase(),
            status: AffiliateStatus::Active,
            tier: 1,
            total_orders: 0,
        }
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AffiliateStatus::Active
    }
}

impl Document for Affiliate {
    const COLLECTION: &'static str = "affiliates";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// One row of the commission table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTier {
    pub level: u32,
    pub percentage: f64,
}

/// Per-tenant affiliate program settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateSettings {
    pub id: DocumentId,
    #[serde(default)]
    pub enabled: bool,
    /// Lifetime of the attribution cookie.
    #[serde(default = "default_cookie_days")]
    pub cookie_days: u32,
    #[serde(default)]
    pub tiers: Vec<CommissionTier>,
}

fn default_cookie_days() -> u32 {
    30
}

impl AffiliateSettings {
    /// Creates enabled settings with the given tier table.
    pub fn enabled_with(tiers: Vec<CommissionTier>) -> Self {
        Self {
            id: DocumentId::new(),
            enabled: true,
            cookie_days: default_cookie_days(),
            tiers,
        }
    }

    /// Percentage for a tier, or 0 if the tier is not in the table.
    pub fn percentage_for(&self, tier: u32) -> f64 {
        self.tiers
            .iter()
            .find(|t| t.level == tier)
            .map_or(0.0, |t| t.percentage.max(0.0))
    }

    /// Commission owed for an order total at the given tier.
    pub fn commission_for(&self, tier: u32, order_total: Money) -> Money {
        order_total.percent_of(self.percentage_for(tier))
    }
}

impl Document for AffiliateSettings {
    const COLLECTION: &'static str = "affiliate_settings";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Approved,
    Paid,
    Rejected,
}

/// Commission earned by an affiliate on one order.
///
/// The id is derived from the order id, so there is at most one record per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRecord {
    pub id: DocumentId,
    pub affiliate_id: DocumentId,
    pub order_id: DocumentId,
    /// Tier at the moment the order was placed.
    pub tier: u32,
    pub order_total: Money,
    pub commission_percentage: f64,
    pub commission_amount: Money,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionRecord {
    /// Deterministic record id for an order.
    pub fn id_for_order(order_id: DocumentId) -> DocumentId {
        DocumentId::derived(order_id, "commission")
    }

    /// Builds a pending record for an attributed order.
    pub fn pending(
        affiliate_id: DocumentId,
        order_id: DocumentId,
        tier: u32,
        order_total: Money,
        commission_percentage: f64,
        commission_amount: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::id_for_order(order_id),
            affiliate_id,
            order_id,
            tier,
            order_total,
            commission_percentage,
            commission_amount,
            status: CommissionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for CommissionRecord {
    const COLLECTION: &'static str = "commissions";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AffiliateSettings {
        AffiliateSettings::enabled_with(vec![
            CommissionTier {
                level: 1,
                percentage: 5.0,
            },
            CommissionTier {
                level: 2,
                percentage: 7.5,
            },
        ])
    }

    #[test]
    fn commission_uses_tier_table() {
        let settings = settings();
        assert_eq!(
            settings.commission_for(1, Money::from_units(1000)),
            Money::from_units(50)
        );
        assert_eq!(
            settings.commission_for(2, Money::from_units(1000)),
            Money::from_units(75)
        );
        assert_eq!(
            settings.commission_for(9, Money::from_units(1000)),
            Money::zero()
        );
    }

    #[test]
    fn negative_percentage_earns_nothing() {
        let settings = AffiliateSettings::enabled_with(vec![CommissionTier {
            level: 1,
            percentage: -3.0,
        }]);
        assert_eq!(settings.commission_for(1, Money::from_units(100)), Money::zero());
    }

    #[test]
    fn commission_id_is_stable_per_order() {
        let order_id = DocumentId::new();
        assert_eq!(
            CommissionRecord::id_for_order(order_id),
            CommissionRecord::id_for_order(order_id)
        );
        assert_ne!(
            CommissionRecord::id_for_order(order_id),
            CommissionRecord::id_for_order(DocumentId::new())
        );
    }

    #[test]
    fn affiliate_promo_code_is_uppercased() {
        let affiliate = Affiliate::new("Ann", " summer10 ");
        assert_eq!(affiliate.promo_code, "SUMMER10");
        assert!(affiliate.is_active());
    }

    #[test]
    fn settings_defaults() {
        let settings: AffiliateSettings =
            serde_json::from_value(serde_json::json!({"id": DocumentId::new().to_string()}))
                .unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.cookie_days, 30);
        assert!(settings.tiers.is_empty());
    }
}
