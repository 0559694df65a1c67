//! Per-tenant store settings and coupons.

use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::Document;

use crate::error::DomainError;
use crate::money::Money;

/// Pricing-related store configuration.
///
/// Every field defaults to zero/empty, so a tenant without settings pays no
/// VAT and no shipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub id: DocumentId,
    #[serde(default)]
    pub vat_percent: f64,
    #[serde(default)]
    pub shipping_inside: Money,
    #[serde(default)]
    pub shipping_outside: Money,
    /// City charged at the `shipping_inside` rate.
    #[serde(default)]
    pub home_city: Option<String>,
    /// Subtotal at or above which shipping is free.
    #[serde(default)]
    pub free_shipping_over: Option<Money>,
    #[serde(default)]
    pub order_code_prefix: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            id: DocumentId::new(),
            vat_percent: 0.0,
            shipping_inside: Money::zero(),
            shipping_outside: Money::zero(),
            home_city: None,
            free_shipping_over: None,
            order_code_prefix: None,
        }
    }
}

impl StoreSettings {
    /// Shipping charge for a delivery city and discounted subtotal.
    pub fn shipping_for(&self, city: &str, subtotal: Money) -> Money {
        if let Some(threshold) = self.free_shipping_over
            && threshold.is_positive()
            && subtotal >= threshold
        {
            return Money::zero();
        }

        let inside = self
            .home_city
            .as_deref()
            .is_some_and(|home| home.trim().eq_ignore_ascii_case(city.trim()));
        if inside {
            self.shipping_inside
        } else {
            self.shipping_outside
        }
    }
}

impl Document for StoreSettings {
    const COLLECTION: &'static str = "store_settings";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponKind {
    /// Percentage of the subtotal.
    Percentage(f64),
    /// Flat amount off.
    Fixed(Money),
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: DocumentId,
    /// Stored uppercased.
    pub code: String,
    pub discount: CouponKind,
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub min_order: Option<Money>,
}

impl Coupon {
    pub const CODE_FIELD: &'static str = "code";

    pub fn new(code: impl AsRef<str>, discount: CouponKind) -> Self {
        Self {
            id: DocumentId::new(),
            code: code.as_ref().trim().to_uppercase(),
            discount,
            is_active: true,
            expires_at: None,
            min_order: None,
        }
    }

    /// Discount this coupon grants on `subtotal` at time `now`.
    ///
    /// Never exceeds the subtotal.
    pub fn discount_for(&self, subtotal: Money, now: DateTime<Utc>) -> Result<Money, DomainError> {
        if !self.is_active {
            return Err(DomainError::CouponInactive {
                code: self.code.clone(),
            });
        }
        if let Some(expired_at) = self.expires_at
            && expired_at <= now
        {
            return Err(DomainError::CouponExpired {
                code: self.code.clone(),
                expired_at,
            });
        }
        if let Some(minimum) = self.min_order
            && subtotal < minimum
        {
            return Err(DomainError::CouponMinimumNotMet {
                code: self.code.clone(),
                minimum,
            });
        }

        let amount = match self.discount {
            CouponKind::Percentage(percent) => subtotal.percent_of(percent.clamp(0.0, 100.0)),
            CouponKind::Fixed(amount) => amount.max(Money::zero()),
        };
        Ok(amount.min(subtotal))
    }
}

impl Document for Coupon {
    const COLLECTION: &'static str = "coupons";

    fn id(&self) -> DocumentId {
        self.id
    }
}
