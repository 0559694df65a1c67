//! The checkout pipeline.
//!
//! Steps, in order: validate, resolve and price products, pre-check stock,
//! screen the customer, price the order, attribute an affiliate, reserve
//! stock, persist the order, append ledger entries, then hand the committed
//! order to the fan-out. Everything up to and including the ledger writes
//! happens before the caller gets the order back. A ledger entry the store
//! rejects is handed to the task queue and retried until it lands; entry
//! IDs are derived from the order, so a retry never writes it twice.

use std::time::Instant;

use chrono::Utc;
use common::{TenantContext, TenantId};
use domain::{
    Affiliate, Coupon, Money, Order, OrderTotals, StockLedgerEntry, StoreSettings,
    derive_code_prefix, format_order_code, random_code_suffix,
};
use store::{Document, DocumentStore, DocumentStoreExt, Filter, IncrementGuard, StoreError};

use crate::attribution::{self, Attribution};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::fanout::FanoutDispatcher;
use crate::intake::{self, CheckoutRequest, PricedLine};
use crate::screening;
use crate::stock::{self, Reservation};

/// Places orders for any tenant.
pub struct CheckoutPipeline<S: DocumentStore + Clone + 'static> {
    store: S,
    fanout: FanoutDispatcher<S>,
    config: CheckoutConfig,
}

impl<S: DocumentStore + Clone + 'static> CheckoutPipeline<S> {
    pub fn new(store: S, fanout: FanoutDispatcher<S>, config: CheckoutConfig) -> Self {
        Self {
            store,
            fanout,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fanout(&self) -> &FanoutDispatcher<S> {
        &self.fanout
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Places an order and returns it as persisted.
    ///
    /// `cookie_header` is the raw `Cookie` request header, if any; only the
    /// affiliate cookie is read from it.
    #[tracing::instrument(
        skip(self, ctx, request, cookie_header),
        fields(tenant_id = %ctx.tenant_id(), request_id = %ctx.request_id())
    )]
    pub async fn place_order(
        &self,
        ctx: &TenantContext,
        request: CheckoutRequest,
        cookie_header: Option<&str>,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.run(ctx, request, cookie_header).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("checkout_orders_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_code = %order.order_code,
                    total = %order.total,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_rejections_total", "reason" => e.kind()).increment(1);
                match e {
                    CheckoutError::Store(_) | CheckoutError::Serialization(_) | CheckoutError::Internal(_) => {
                        tracing::error!(error = %e, "checkout failed")
                    }
                    _ => tracing::info!(error = %e, kind = e.kind(), "checkout rejected"),
                }
            }
        }
        result
    }

    async fn run(
        &self,
        ctx: &TenantContext,
        request: CheckoutRequest,
        cookie_header: Option<&str>,
    ) -> Result<Order> {
        let tenant = ctx.tenant_id();
        let checkout = request.into_validated()?;

        let lines = intake::resolve_lines(&self.store, tenant, &checkout.lines).await?;
        stock::check_availability(&lines)?;
        screening::screen_customer(&self.store, tenant, &checkout.customer).await?;

        let settings: StoreSettings = self
            .store
            .find_one_as(tenant, &Filter::new())
            .await?
            .unwrap_or_default();
        let totals = self
            .price(tenant, &lines, &settings, checkout.coupon_code.as_deref(), &checkout.customer.city)
            .await?;

        let order_code = self.next_order_code(tenant, &settings).await?;
        let mut order = Order::new(
            order_code,
            lines.iter().map(|l| l.item.clone()).collect(),
            totals,
            checkout.payment_method,
            checkout.customer,
        );
        order.channel = checkout.channel;
        order.coupon_code = checkout.coupon_code;
        order.source_tracking = checkout.source_tracking;

        let attribution = self.attribute(tenant, cookie_header, order.total).await;
        if let Some(attribution) = &attribution {
            attribution.apply_to(&mut order);
        }

        let reservation = stock::reserve(&self.store, tenant, &lines).await?;
        if let Err(e) = self.store.insert(tenant, &order).await {
            tracing::error!(order_id = %order.id, error = %e, "order insert failed, releasing stock");
            reservation.release(&self.store, tenant).await;
            return Err(e.into());
        }

        self.append_ledger(tenant, &order, &reservation).await;

        let commission = attribution.as_ref().and_then(|a| a.commission_record(&order));
        if let Some(attribution) = &attribution {
            self.count_affiliate_order(tenant, attribution).await;
        }

        self.fanout.dispatch(ctx, &order, commission).await;
        Ok(order)
    }

    async fn price(
        &self,
        tenant: &TenantId,
        lines: &[PricedLine],
        settings: &StoreSettings,
        coupon_code: Option<&str>,
        city: &str,
    ) -> Result<OrderTotals> {
        let items: Vec<_> = lines.iter().map(|l| l.item.clone()).collect();
        let subtotal: Money = items.iter().map(|i| i.line_total()).sum();

        let discount = match coupon_code {
            Some(code) => {
                let coupon: Coupon = self
                    .store
                    .find_one_as(tenant, &Filter::new().eq(Coupon::CODE_FIELD, code))
                    .await?
                    .ok_or_else(|| CheckoutError::Validation(format!("Unknown coupon {code}")))?;
                coupon.discount_for(subtotal, Utc::now())?
            }
            None => Money::zero(),
        };

        let shipping = settings.shipping_for(city, subtotal - discount);
        Ok(OrderTotals::compute(&items, discount, settings.vat_percent, shipping))
    }

    async fn next_order_code(&self, tenant: &TenantId, settings: &StoreSettings) -> Result<String> {
        let placed = self.store.count_of::<Order>(tenant, &Filter::new()).await?;
        let prefix = derive_code_prefix(settings.order_code_prefix.as_deref(), tenant);
        Ok(format_order_code(&prefix, placed + 1, &random_code_suffix()))
    }

    async fn attribute(
        &self,
        tenant: &TenantId,
        cookie_header: Option<&str>,
        order_total: Money,
    ) -> Option<Attribution> {
        let raw = cookie_header.and_then(|h| attribution::cookie_value(h, &self.config.affiliate_cookie))?;
        let Some(token) = attribution::decode_token(raw) else {
            tracing::debug!("ignoring undecodable affiliate cookie");
            return None;
        };
        attribution::attribute(&self.store, tenant, &token, order_total, Utc::now()).await
    }

    /// Writes one ledger entry per reserved product. An entry the store
    /// rejects is queued and retried; an entry already present counts as written.
    async fn append_ledger(&self, tenant: &TenantId, order: &Order, reservation: &Reservation) {
        for entry in reservation.ledger_entries(order.id) {
            let error = match insert_ledger_entry(&self.store, tenant, &entry).await {
                Ok(()) => continue,
                Err(e) => e,
            };
            metrics::counter!("stock_ledger_deferred_total").increment(1);
            tracing::warn!(
                order_id = %order.id,
                product_id = %entry.product_id,
                error = %error,
                "stock ledger append failed, queued for retry"
            );

            let store = self.store.clone();
            let tenant = tenant.clone();
            self.fanout
                .queue()
                .enqueue("stock_ledger", move || {
                    let store = store.clone();
                    let tenant = tenant.clone();
                    let entry = entry.clone();
                    async move {
                        insert_ledger_entry(&store, &tenant, &entry).await?;
                        Ok::<(), CheckoutError>(())
                    }
                })
                .await;
        }
    }

    async fn count_affiliate_order(&self, tenant: &TenantId, attribution: &Attribution) {
        let result = self
            .store
            .increment(
                tenant,
                Affiliate::COLLECTION,
                attribution.affiliate.id,
                Affiliate::TOTAL_ORDERS_FIELD,
                1,
                IncrementGuard::None,
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(affiliate_id = %attribution.affiliate.id, error = %e, "failed to count affiliate order");
        }
    }
}

async fn insert_ledger_entry<S: DocumentStore>(
    store: &S,
    tenant: &TenantId,
    entry: &StockLedgerEntry,
) -> store::Result<()> {
    match store.insert(tenant, entry).await {
        Ok(_) | Err(StoreError::Conflict { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}
