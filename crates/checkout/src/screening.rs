//! Block-list screening.

use common::TenantId;
use domain::{BlockListEntry, CustomerSnapshot, phone_conditions};
use store::{Condition, DocumentStore, DocumentStoreExt, Filter};

use crate::error::{CheckoutError, Result};

/// Rejects customers matching an active block-list entry by phone or email.
///
/// The screen itself failing (e.g. the block list is unreachable) lets the
/// order through; only a positive match is fatal.
#[tracing::instrument(skip(store, customer), fields(tenant_id = %tenant))]
pub async fn screen_customer<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    customer: &CustomerSnapshot,
) -> Result<()> {
    let mut conditions = phone_conditions(&customer.phone);
    if let Some(email) = customer.email.as_deref().map(str::trim)
        && !email.is_empty()
    {
        conditions.push(Condition::eq_ignore_case(BlockListEntry::EMAIL_FIELD, email));
    }
    if conditions.is_empty() {
        return Ok(());
    }

    let filter = Filter::new()
        .eq(BlockListEntry::ACTIVE_FIELD, true)
        .any_of(conditions)
        .limit(1);

    match store.find_one_as::<BlockListEntry>(tenant, &filter).await {
        Ok(Some(entry)) => {
            metrics::counter!("blocklist_matches_total").increment(1);
            tracing::warn!(entry_id = %entry.id, reason = ?entry.reason, "blocked customer attempted checkout");
            Err(CheckoutError::CustomerBlocked)
        }
        Ok(None) => Ok(()),
        Err(e) => {
            metrics::counter!("blocklist_check_failures_total").increment(1);
            tracing::warn!(error = %e, "block-list check failed, allowing order");
            Ok(())
        }
    }
}
