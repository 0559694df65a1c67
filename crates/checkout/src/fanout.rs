//! Post-commit side effects.
//!
//! The order push to the tenant dashboard is attempted inline; every other
//! branch is a job on the [`TaskQueue`]. No branch can fail or roll back the
//! order, and branches do not depend on each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{TenantContext, TenantId};
use domain::{CommissionRecord, Notification, Order, PaymentMethod, StaffRole, StaffUser};
use mailer::{EmailDispatcher, EmailTemplate, TemplateVars};
use serde_json::json;
use store::{Document, DocumentStore, DocumentStoreExt, Filter, StoreError};

use crate::error::{CheckoutError, Result};
use crate::services::{
    ConversionEvent, ConversionTracker, FraudScoreService, RealtimeChannel, RealtimeMessage,
};
use crate::tasks::TaskQueue;

/// Collaborators of the fan-out. Optional services are skipped when absent.
#[derive(Clone)]
pub struct FanoutServices {
    pub realtime: Arc<dyn RealtimeChannel>,
    pub fraud: Option<Arc<dyn FraudScoreService>>,
    pub conversion: Option<Arc<dyn ConversionTracker>>,
}

/// Dispatches the side effects of a committed order.
pub struct FanoutDispatcher<S: DocumentStore + Clone + 'static> {
    store: S,
    mailer: Arc<EmailDispatcher<S>>,
    services: FanoutServices,
    queue: TaskQueue,
    fraud_timeout: Duration,
    store_name: String,
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CashOnDelivery => "Cash on delivery",
        PaymentMethod::Card => "Card",
        PaymentMethod::MobileWallet => "Mobile wallet",
        PaymentMethod::BankTransfer => "Bank transfer",
    }
}

fn email_vars(order: &Order, store_name: &str) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("orderCode".into(), order.order_code.clone());
    vars.insert("customerName".into(), order.customer.name.clone());
    vars.insert("customerPhone".into(), order.customer.phone.clone());
    vars.insert("total".into(), order.total.to_string());
    vars.insert("itemCount".into(), order.unit_count().to_string());
    vars.insert("paymentMethod".into(), payment_label(order.payment_method).into());
    vars.insert("storeName".into(), store_name.to_string());
    vars
}

/// Creates the commission record unless one already exists for the order.
///
/// Returns true if a record was written.
pub async fn record_commission<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    record: &CommissionRecord,
) -> Result<bool> {
    if store
        .get::<CommissionRecord>(tenant, record.id)
        .await?
        .is_some()
    {
        return Ok(false);
    }
    match store.insert(tenant, record).await {
        Ok(_) => Ok(true),
        Err(StoreError::Conflict { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn send_email<S: DocumentStore>(
    mailer: &EmailDispatcher<S>,
    tenant: &TenantId,
    to: &str,
    template: &EmailTemplate,
    vars: &TemplateVars,
) -> Result<()> {
    let result = mailer.send_templated_email(tenant, to, template, vars).await;
    if result.ok {
        Ok(())
    } else {
        Err(CheckoutError::Email(
            result.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

impl<S: DocumentStore + Clone + 'static> FanoutDispatcher<S> {
    pub fn new(
        store: S,
        mailer: Arc<EmailDispatcher<S>>,
        services: FanoutServices,
        queue: TaskQueue,
        fraud_timeout: Duration,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            services,
            queue,
            fraud_timeout,
            store_name: store_name.into(),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Runs every branch for a committed order.
    ///
    /// Safe to call more than once for the same order: the commission record
    /// is keyed on the order id.
    #[tracing::instrument(skip(self, ctx, order, commission), fields(tenant_id = %ctx.tenant_id(), order_id = %order.id))]
    pub async fn dispatch(
        &self,
        ctx: &TenantContext,
        order: &Order,
        commission: Option<CommissionRecord>,
    ) {
        let tenant = ctx.tenant_id().clone();
        metrics::counter!("fanout_dispatch_total").increment(1);

        self.push_order(&tenant, order).await;
        self.enqueue_staff_fanout(&tenant, order).await;
        self.enqueue_customer_email(&tenant, order).await;
        if let Some(record) = commission {
            self.enqueue_commission(&tenant, record).await;
        }
        if order.payment_method.is_cash_on_delivery() {
            self.enqueue_conversion(&tenant, order).await;
        }
        self.enqueue_fraud_enrichment(&tenant, order).await;
    }

    async fn push_order(&self, tenant: &TenantId, order: &Order) {
        let payload = match serde_json::to_value(order) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize order for realtime push");
                return;
            }
        };
        let message = RealtimeMessage::to_tenant(tenant.clone(), RealtimeMessage::ORDER_CREATED, payload);
        if let Err(e) = self.services.realtime.publish(message).await {
            tracing::warn!(error = %e, "realtime order push failed");
        }
    }

    /// Notifies every merchant and admin: push first, then persist, then alert email.
    async fn enqueue_staff_fanout(&self, tenant: &TenantId, order: &Order) {
        let store = self.store.clone();
        let mailer = self.mailer.clone();
        let realtime = self.services.realtime.clone();
        let queue = self.queue.clone();
        let tenant = tenant.clone();
        let order = order.clone();
        let vars = email_vars(&order, &self.store_name);

        self.queue
            .enqueue("staff_notifications", move || {
                let store = store.clone();
                let mailer = mailer.clone();
                let realtime = realtime.clone();
                let queue = queue.clone();
                let tenant = tenant.clone();
                let order = order.clone();
                let vars = vars.clone();
                async move {
                    let roles = StaffRole::ORDER_RECIPIENTS
                        .iter()
                        .map(|role| json!(role.as_str()))
                        .collect();
                    let filter = Filter::new()
                        .is_in(StaffUser::ROLE_FIELD, roles)
                        .eq("isActive", true);
                    let recipients: Vec<StaffUser> = store.find_as(&tenant, &filter).await?;
                    tracing::debug!(recipients = recipients.len(), "notifying staff");

                    for user in recipients {
                        let notification = Notification::new_order(user.id, &order);
                        match serde_json::to_value(&notification) {
                            Ok(payload) => {
                                let message = RealtimeMessage::to_user(
                                    tenant.clone(),
                                    user.id,
                                    RealtimeMessage::NOTIFICATION,
                                    payload,
                                );
                                if let Err(e) = realtime.publish(message).await {
                                    tracing::warn!(user_id = %user.id, error = %e, "notification push failed");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "failed to serialize notification"),
                        }

                        let persist_store = store.clone();
                        let persist_tenant = tenant.clone();
                        queue
                            .enqueue("notification_persist", move || {
                                let store = persist_store.clone();
                                let tenant = persist_tenant.clone();
                                let notification = notification.clone();
                                async move {
                                    match store.insert(&tenant, &notification).await {
                                        Ok(_) | Err(StoreError::Conflict { .. }) => Ok(()),
                                        Err(e) => Err(CheckoutError::from(e)),
                                    }
                                }
                            })
                            .await;

                        if let Some(email) = user.email.clone().filter(|e| !e.trim().is_empty()) {
                            let mailer = mailer.clone();
                            let tenant = tenant.clone();
                            let vars = vars.clone();
                            queue
                                .enqueue("staff_alert_email", move || {
                                    let mailer = mailer.clone();
                                    let tenant = tenant.clone();
                                    let email = email.clone();
                                    let vars = vars.clone();
                                    async move {
                                        send_email(
                                            &mailer,
                                            &tenant,
                                            &email,
                                            &EmailTemplate::new_order_alert(),
                                            &vars,
                                        )
                                        .await
                                    }
                                })
                                .await;
                        }
                    }
                    Ok::<(), CheckoutError>(())
                }
            })
            .await;
    }

    async fn enqueue_customer_email(&self, tenant: &TenantId, order: &Order) {
        let Some(email) = order.customer.email.clone() else {
            tracing::info!("no customer email, skipping order confirmation");
            return;
        };
        let mailer = self.mailer.clone();
        let tenant = tenant.clone();
        let vars = email_vars(order, &self.store_name);

        self.queue
            .enqueue("customer_email", move || {
                let mailer = mailer.clone();
                let tenant = tenant.clone();
                let email = email.clone();
                let vars = vars.clone();
                async move {
                    send_email(
                        &mailer,
                        &tenant,
                        &email,
                        &EmailTemplate::order_confirmation(),
                        &vars,
                    )
                    .await
                }
            })
            .await;
    }

    async fn enqueue_commission(&self, tenant: &TenantId, record: CommissionRecord) {
        let store = self.store.clone();
        let tenant = tenant.clone();

        self.queue
            .enqueue("commission", move || {
                let store = store.clone();
                let tenant = tenant.clone();
                let record = record.clone();
                async move {
                    if record_commission(&store, &tenant, &record).await? {
                        tracing::info!(
                            order_id = %record.order_id,
                            affiliate_id = %record.affiliate_id,
                            amount = %record.commission_amount,
                            "commission recorded"
                        );
                    } else {
                        tracing::debug!(order_id = %record.order_id, "commission already recorded");
                    }
                    Ok::<(), CheckoutError>(())
                }
            })
            .await;
    }

    async fn enqueue_conversion(&self, tenant: &TenantId, order: &Order) {
        let Some(tracker) = self.services.conversion.clone() else {
            tracing::debug!("conversion tracking not configured");
            return;
        };
        let tenant = tenant.clone();
        let event = ConversionEvent::purchase(order);

        self.queue
            .enqueue("conversion", move || {
                let tracker = tracker.clone();
                let tenant = tenant.clone();
                let event = event.clone();
                async move { tracker.track(&tenant, &event).await }
            })
            .await;
    }

    async fn enqueue_fraud_enrichment(&self, tenant: &TenantId, order: &Order) {
        let phone = order.customer.phone.trim().to_string();
        if phone.is_empty() {
            return;
        }
        let Some(fraud) = self.services.fraud.clone() else {
            tracing::debug!("fraud service not configured");
            return;
        };
        let store = self.store.clone();
        let tenant = tenant.clone();
        let order_id = order.id;
        let timeout = self.fraud_timeout;

        self.queue
            .enqueue("fraud_enrichment", move || {
                let fraud = fraud.clone();
                let store = store.clone();
                let tenant = tenant.clone();
                let phone = phone.clone();
                async move {
                    let snapshot = tokio::time::timeout(timeout, fraud.lookup(&phone))
                        .await
                        .map_err(|_| {
                            CheckoutError::FraudService(format!(
                                "lookup timed out after {}s",
                                timeout.as_secs()
                            ))
                        })??;

                    let risk_tier = snapshot.risk_tier;
                    let patch = json!({
                        (Order::FRAUD_CHECK_FIELD): snapshot,
                        "updatedAt": Utc::now(),
                    });
                    let updated = store
                        .update_one(&tenant, Order::COLLECTION, &Filter::by_id(order_id), patch)
                        .await?;
                    if updated {
                        tracing::info!(%order_id, ?risk_tier, "fraud snapshot attached");
                    } else {
                        tracing::warn!(%order_id, "order vanished before fraud snapshot was attached");
                    }
                    Ok::<(), CheckoutError>(())
                }
            })
            .await;
    }
}
