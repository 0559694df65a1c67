//! Server-side order totals.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::LineItem;

/// Computed monetary breakdown of an order.
///
/// Always satisfies `total == subtotal - discount + vat + shipping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub vat: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Computes totals from priced line items.
    ///
    /// The discount is clamped to `[0, subtotal]`; VAT applies to the
    /// discounted subtotal and excludes shipping.
    pub fn compute(
        items: &[LineItem],
        discount: Money,
        vat_percent: f64,
        shipping: Money,
    ) -> Self {
        let subtotal: Money = items.iter().map(LineItem::line_total).sum();
        let discount = discount.max(Money::zero()).min(subtotal);
        let taxable = subtotal - discount;
        let vat = if vat_percent > 0.0 {
            taxable.percent_of(vat_percent)
        } else {
            Money::zero()
        };
        let shipping = shipping.max(Money::zero());

        Self {
            subtotal,
            discount,
            vat,
            shipping,
            total: taxable + vat + shipping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DocumentId;

    fn item(unit_price: i64, quantity: u32) -> LineItem {
        LineItem {
            product_id: DocumentId::new(),
            name: "item".into(),
            unit_price: Money::from_units(unit_price),
            quantity,
            size: None,
            color: None,
        }
    }

    #[test]
    fn test_totals_without_extras() {
        let totals = OrderTotals::compute(&[item(250, 2), item(500, 1)], Money::zero(), 0.0, Money::zero());
        assert_eq!(totals.subtotal, Money::from_units(1000));
        assert_eq!(totals.total, Money::from_units(1000));
    }

    #[test]
    fn test_totals_with_discount_vat_and_shipping() {
        let totals = OrderTotals::compute(
            &[item(1000, 1)],
            Money::from_units(200),
            10.0,
            Money::from_units(60),
        );
        assert_eq!(totals.vat, Money::from_units(80));
        assert_eq!(totals.total, Money::from_units(940));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount + totals.vat + totals.shipping
        );
    }

    #[test]
    fn test_discount_is_clamped() {
        let totals = OrderTotals::compute(&[item(100, 1)], Money::from_units(500), 0.0, Money::from_units(10));
        assert_eq!(totals.discount, Money::from_units(100));
        assert_eq!(totals.total, Money::from_units(10));

        let negative = OrderTotals::compute(&[item(100, 1)], Money::from_units(-5), 0.0, Money::zero());
        assert_eq!(negative.discount, Money::zero());
    }

    #[test]
    fn test_empty_items() {
        let totals = OrderTotals::compute(&[], Money::zero(), 5.0, Money::zero());
        assert_eq!(totals, OrderTotals::default());
    }
}
