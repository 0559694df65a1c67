//! Stock pre-check, atomic reservation, and compensation.
//!
//! Each tracked line is reserved with a guarded decrement, so concurrent
//! checkouts can never drive stock below zero. A failed reservation or a
//! failed order insert releases everything reserved so far, in reverse order.

use std::collections::HashMap;

use common::{DocumentId, TenantId};
use domain::{Product, StockLedgerEntry};
use store::{Adjustment, Document, DocumentStore, DocumentStoreExt, IncrementGuard};

use crate::error::{CheckoutError, Result};
use crate::intake::PricedLine;

/// Tracked products with their summed quantity, in order of first appearance.
fn requested_per_product(lines: &[PricedLine]) -> Vec<(&Product, u32)> {
    let mut requested: Vec<(&Product, u32)> = Vec::new();
    let mut index: HashMap<DocumentId, usize> = HashMap::new();
    for line in lines.iter().filter(|l| l.product.track_stock) {
        match index.get(&line.product.id) {
            Some(&i) => requested[i].1 = requested[i].1.saturating_add(line.item.quantity),
            None => {
                index.insert(line.product.id, requested.len());
                requested.push((&line.product, line.item.quantity));
            }
        }
    }
    requested
}

/// Verifies, without writing, that every tracked product covers its lines.
///
/// Lines for the same product are summed.
pub fn check_availability(lines: &[PricedLine]) -> Result<()> {
    for (product, quantity) in requested_per_product(lines) {
        if !product.has_stock_for(quantity) {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                available: product.stock,
                requested: quantity,
            });
        }
    }
    Ok(())
}

/// One successful decrement, covering every line for one product.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    pub product_id: DocumentId,
    pub product_name: String,
    pub quantity: u32,
    pub adjustment: Adjustment,
}

/// Stock held for one order.
#[derive(Debug, Clone, Default)]
pub struct Reservation {
    lines: Vec<ReservedLine>,
}

impl Reservation {
    pub fn lines(&self) -> &[ReservedLine] {
        &self.lines
    }

    /// Ledger entries for the committed order, one per product in line-item order.
    pub fn ledger_entries(&self, order_id: DocumentId) -> Vec<StockLedgerEntry> {
        self.lines
            .iter()
            .map(|line| {
                StockLedgerEntry::for_order(
                    line.product_id,
                    line.product_name.clone(),
                    line.adjustment,
                    order_id,
                )
            })
            .collect()
    }

    /// Returns every reserved unit to stock, last reservation first.
    ///
    /// Failures are logged; the remaining lines are still released.
    pub async fn release<S: DocumentStore + ?Sized>(self, store: &S, tenant: &TenantId) {
        for line in self.lines.into_iter().rev() {
            let restored = store
                .increment(
                    tenant,
                    Product::COLLECTION,
                    line.product_id,
                    Product::STOCK_FIELD,
                    i64::from(line.quantity),
                    IncrementGuard::None,
                )
                .await;
            match restored {
                Ok(_) => {
                    tracing::debug!(product_id = %line.product_id, quantity = line.quantity, "stock released");
                }
                Err(e) => {
                    metrics::counter!("stock_release_failures_total").increment(1);
                    tracing::error!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %e,
                        "failed to release reserved stock"
                    );
                }
            }
        }
    }
}

/// Reserves stock for every tracked product.
///
/// Lines for the same product are reserved with a single decrement.
/// On any failure the partial reservation is released before returning.
#[tracing::instrument(skip(store, lines), fields(tenant_id = %tenant))]
pub async fn reserve<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    lines: &[PricedLine],
) -> Result<Reservation> {
    let mut reservation = Reservation::default();

    for (product, quantity) in requested_per_product(lines) {
        let result = store
            .increment(
                tenant,
                Product::COLLECTION,
                product.id,
                Product::STOCK_FIELD,
                -i64::from(quantity),
                IncrementGuard::AtLeast(i64::from(quantity)),
            )
            .await;

        match result {
            Ok(Some(adjustment)) => {
                metrics::counter!("stock_reservations_total").increment(1);
                reservation.lines.push(ReservedLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity,
                    adjustment,
                });
            }
            Ok(None) => {
                reservation.release(store, tenant).await;
                let available = current_stock(store, tenant, product.id).await;
                tracing::info!(
                    product_id = %product.id,
                    available,
                    requested = quantity,
                    "stock reservation lost a race"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    available,
                    requested: quantity,
                });
            }
            Err(e) => {
                reservation.release(store, tenant).await;
                return Err(e.into());
            }
        }
    }

    Ok(reservation)
}

async fn current_stock<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    product_id: DocumentId,
) -> i64 {
    match store.get::<Product>(tenant, product_id).await {
        Ok(Some(product)) => product.stock.max(0),
        _ => 0,
    }
}
