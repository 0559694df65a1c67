//! Stock ledger: append-only audit trail of inventory changes.

use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::{Adjustment, Document};

/// Why stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Order,
    Restock,
    Adjustment,
}

/// One immutable stock change.
///
/// For every product, summing `quantity` over all entries in creation order
/// reproduces the current stock from the initial stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLedgerEntry {
    pub id: DocumentId,
    pub product_id: DocumentId,
    pub product_name: String,
    /// Signed delta; negative for sales.
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    /// Stable ID of the entry an order writes for a product, so a repeated
    /// append of the same entry is rejected as a duplicate.
    pub fn order_entry_id(order_id: DocumentId, product_id: DocumentId) -> DocumentId {
        DocumentId::derived(order_id, &format!("stock-ledger:{product_id}"))
    }

    /// Records a sale taken from an applied stock adjustment.
    pub fn for_order(
        product_id: DocumentId,
        product_name: impl Into<String>,
        adjustment: Adjustment,
        order_id: DocumentId,
    ) -> Self {
        Self {
            id: Self::order_entry_id(order_id, product_id),
            product_id,
            product_name: product_name.into(),
            quantity: adjustment.current - adjustment.previous,
            previous_stock: adjustment.previous,
            new_stock: adjustment.current,
            transaction_type: TransactionType::Order,
            order_id: Some(order_id),
            created_at: Utc::now(),
        }
    }
}

impl Document for StockLedgerEntry {
    const COLLECTION: &'static str = "inventory_transactions";

    fn id(&self) -> DocumentId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_entry_from_adjustment() {
        let order_id = DocumentId::new();
        let entry = StockLedgerEntry::for_order(
            DocumentId::new(),
            "Shirt",
            Adjustment {
                previous: 3,
                current: 1,
            },
            order_id,
        );
        assert_eq!(entry.quantity, -2);
        assert_eq!(entry.previous_stock, 3);
        assert_eq!(entry.new_stock, 1);
        assert_eq!(entry.order_id, Some(order_id));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["transactionType"], "order");
        assert_eq!(json["previousStock"], 3);
    }

    #[test]
    fn order_entry_ids_are_stable_per_product() {
        let order_id = DocumentId::new();
        let shirt = DocumentId::new();
        let hat = DocumentId::new();
        let adjustment = Adjustment {
            previous: 3,
            current: 1,
        };

        let first = StockLedgerEntry::for_order(shirt, "Shirt", adjustment, order_id);
        let again = StockLedgerEntry::for_order(shirt, "Shirt", adjustment, order_id);
        let other = StockLedgerEntry::for_order(hat, "Hat", adjustment, order_id);
        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_ne!(
            first.id,
            StockLedgerEntry::for_order(shirt, "Shirt", adjustment, DocumentId::new()).id
        );
    }
}
