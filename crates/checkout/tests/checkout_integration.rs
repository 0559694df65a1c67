//! End-to-end checkout tests against the in-memory store and collaborators.

use std::sync::Arc;
use std::time::Duration;

use checkout::{
    CheckoutConfig, CheckoutError, CheckoutPipeline, CheckoutRequest, FanoutDispatcher,
    FanoutServices, InMemoryConversionTracker, InMemoryFraudScoreService, InMemoryRealtimeChannel,
    RealtimeMessage, RetryPolicy, TaskQueue,
};
use chrono::Utc;
use common::{DocumentId, TenantContext, TenantId};
use domain::{
    Affiliate, AffiliateSettings, BlockListEntry, CommissionRecord, CommissionStatus,
    CommissionTier, Coupon, CouponKind, Money, Notification, Order, OrderStatus, Product,
    RiskTier, StaffRole, StaffUser, StockLedgerEntry, StoreSettings,
};
use mailer::{
    EmailDispatcher, InMemoryEmailTransport, ProviderConfig, ProviderRole, ProviderSettings,
    SecretCipher,
};
use serde_json::{Value, json};
use store::{Document, DocumentStoreExt, Filter, InMemoryDocumentStore};

struct TestHarness {
    store: InMemoryDocumentStore,
    transport: InMemoryEmailTransport,
    realtime: InMemoryRealtimeChannel,
    fraud: InMemoryFraudScoreService,
    conversion: InMemoryConversionTracker,
    queue: TaskQueue,
    pipeline: Arc<CheckoutPipeline<InMemoryDocumentStore>>,
    tenant: TenantId,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_retry(RetryPolicy::immediate(2))
    }

    fn with_retry(policy: RetryPolicy) -> Self {
        let store = InMemoryDocumentStore::new();
        let transport = InMemoryEmailTransport::new();
        let realtime = InMemoryRealtimeChannel::new();
        let fraud = InMemoryFraudScoreService::new();
        let conversion = InMemoryConversionTracker::new();
        let (queue, _worker) = TaskQueue::start(64, policy);

        let mailer = Arc::new(EmailDispatcher::new(
            store.clone(),
            Arc::new(transport.clone()),
            SecretCipher::new("test-key"),
        ));
        let services = FanoutServices {
            realtime: Arc::new(realtime.clone()),
            fraud: Some(Arc::new(fraud.clone())),
            conversion: Some(Arc::new(conversion.clone())),
        };
        let config = CheckoutConfig::default();
        let fanout = FanoutDispatcher::new(
            store.clone(),
            mailer,
            services,
            queue.clone(),
            Duration::from_secs(1),
            "Test Shop",
        );
        let pipeline = Arc::new(CheckoutPipeline::new(store.clone(), fanout, config));

        Self {
            store,
            transport,
            realtime,
            fraud,
            conversion,
            queue,
            pipeline,
            tenant: TenantId::new("shop-1").unwrap(),
        }
    }

    fn ctx(&self) -> TenantContext {
        TenantContext::new(self.tenant.clone())
    }

    async fn product(&self, slug: &str, units: i64, stock: i64) -> Product {
        let product = Product::new(slug.to_uppercase(), slug, Money::from_units(units), stock);
        self.store.insert(&self.tenant, &product).await.unwrap();
        product
    }

    async fn stock_of(&self, id: DocumentId) -> i64 {
        self.store
            .get::<Product>(&self.tenant, id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn count(&self, collection: &str) -> usize {
        self.store.document_count(&self.tenant, collection).await
    }

    async fn email_provider(&self) {
        let cipher = SecretCipher::new("test-key");
        let config = ProviderConfig::new(
            ProviderSettings::Sendgrid {
                api_key: Some(cipher.seal("SG.key").unwrap()),
                categories: vec![],
            },
            "shop@example.com",
            ProviderRole::Primary,
        );
        self.store.insert(&self.tenant, &config).await.unwrap();
    }

    async fn affiliate_program(&self, percentage: f64) -> Affiliate {
        let affiliate = Affiliate::new("Ann", "ann10");
        self.store.insert(&self.tenant, &affiliate).await.unwrap();
        self.store
            .insert(
                &self.tenant,
                &AffiliateSettings::enabled_with(vec![CommissionTier {
                    level: 1,
                    percentage,
                }]),
            )
            .await
            .unwrap();
        affiliate
    }

    async fn place(&self, body: Value, cookie: Option<&str>) -> Result<Order, CheckoutError> {
        let request: CheckoutRequest = serde_json::from_value(body).unwrap();
        self.pipeline.place_order(&self.ctx(), request, cookie).await
    }

    async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.queue.wait_idle())
            .await
            .expect("background tasks did not settle");
    }
}

fn customer() -> Value {
    json!({
        "name": "Jane Doe",
        "phone": "01712345678",
        "email": "jane@example.com",
        "address": "Road 1",
        "city": "Dhaka",
        "postalCode": "1207"
    })
}

fn order_body(slug: &str, quantity: i64) -> Value {
    json!({
        "items": [{"slug": slug, "quantity": quantity, "price": 0.01}],
        "customer": customer()
    })
}

fn affiliate_cookie(affiliate: &Affiliate, expiry: Option<i64>) -> String {
    let mut token = json!({
        "promoCode": affiliate.promo_code,
        "affiliateId": affiliate.id.to_string(),
    });
    if let Some(expiry) = expiry {
        token["expiry"] = json!(expiry);
    }
    let encoded: String = url::form_urlencoded::byte_serialize(token.to_string().as_bytes()).collect();
    format!("session=abc; affiliate_ref={encoded}")
}

#[tokio::test]
async fn scenario_a_order_reserves_stock_and_writes_ledger() {
    let h = TestHarness::new();
    let product = h.product("shirt", 500, 3).await;

    let order = h.place(order_body("shirt", 2), None).await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, Money::from_units(1000));
    assert!(order.verify_total());
    assert_eq!(h.stock_of(product.id).await, 1);

    let ledger: Vec<StockLedgerEntry> = h.store.find_as(&h.tenant, &Filter::new()).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].previous_stock, 3);
    assert_eq!(ledger[0].new_stock, 1);
    assert_eq!(ledger[0].quantity, -2);
    assert_eq!(ledger[0].order_id, Some(order.id));

    let stored: Order = h.store.get(&h.tenant, order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_code, order.order_code);
    assert!(order.order_code.starts_with("SHO-000001"));
    h.settle().await;
}

#[tokio::test]
async fn scenario_b_insufficient_stock_is_rejected_without_side_effects() {
    let h = TestHarness::new();
    let product = h.product("shirt", 500, 1).await;

    let err = h.place(order_body("shirt", 2), None).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock {
            available: 1,
            requested: 2,
            ..
        }
    ));

    assert_eq!(h.stock_of(product.id).await, 1);
    assert_eq!(h.count(Order::COLLECTION).await, 0);
    assert_eq!(h.count(StockLedgerEntry::COLLECTION).await, 0);
    assert_eq!(h.queue.pending(), 0);
}

#[tokio::test]
async fn scenario_c_blocked_customer_is_rejected_without_side_effects() {
    let h = TestHarness::new();
    let product = h.product("shirt", 1000, 5).await;
    let affiliate = h.affiliate_program(5.0).await;
    h.store
        .insert(&h.tenant, &BlockListEntry::phone("+8801712345678"))
        .await
        .unwrap();

    let cookie = affiliate_cookie(&affiliate, None);
    let err = h
        .place(order_body("shirt", 1), Some(&cookie))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::CustomerBlocked));

    h.settle().await;
    assert_eq!(h.stock_of(product.id).await, 5);
    assert_eq!(h.count(Order::COLLECTION).await, 0);
    assert_eq!(h.count(StockLedgerEntry::COLLECTION).await, 0);
    assert_eq!(h.count(CommissionRecord::COLLECTION).await, 0);
    assert!(h.realtime.messages().await.is_empty());
}

#[tokio::test]
async fn scenario_d_affiliate_cookie_earns_commission() {
    let h = TestHarness::new();
    h.product("watch", 1000, 5).await;
    let affiliate = h.affiliate_program(5.0).await;
    let expiry = (Utc::now() + chrono::Duration::days(1)).timestamp_millis();
    let cookie = affiliate_cookie(&affiliate, Some(expiry));

    let order = h.place(order_body("watch", 1), Some(&cookie)).await.unwrap();
    assert_eq!(order.total, Money::from_units(1000));
    assert_eq!(order.affiliate_id, Some(affiliate.id));
    assert_eq!(order.affiliate_code.as_deref(), Some("ANN10"));
    assert_eq!(order.affiliate_commission, Some(Money::from_units(50)));
    let wire = serde_json::to_value(&order).unwrap();
    assert_eq!(wire["total"], 1000);
    assert_eq!(wire["affiliateCommission"], 50);

    h.settle().await;
    let records: Vec<CommissionRecord> = h.store.find_as(&h.tenant, &Filter::new()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].order_id, order.id);
    assert_eq!(records[0].commission_amount, Money::from_units(50));
    assert_eq!(records[0].status, CommissionStatus::Pending);
    assert_eq!(serde_json::to_value(&records[0]).unwrap()["commissionAmount"], 50);

    let counted: Affiliate = h.store.get(&h.tenant, affiliate.id).await.unwrap().unwrap();
    assert_eq!(counted.total_orders, 1);
}

#[tokio::test]
async fn rerunning_fanout_does_not_duplicate_commission() {
    let h = TestHarness::new();
    h.product("watch", 1000, 5).await;
    let affiliate = h.affiliate_program(5.0).await;
    let cookie = affiliate_cookie(&affiliate, None);

    let order = h.place(order_body("watch", 1), Some(&cookie)).await.unwrap();
    h.settle().await;

    let record = CommissionRecord::pending(
        affiliate.id,
        order.id,
        1,
        order.total,
        5.0,
        Money::from_units(50),
    );
    h.pipeline
        .fanout()
        .dispatch(&h.ctx(), &order, Some(record))
        .await;
    h.settle().await;

    assert_eq!(h.count(CommissionRecord::COLLECTION).await, 1);
}

#[tokio::test]
async fn bad_affiliate_cookies_are_ignored() {
    let h = TestHarness::new();
    h.product("watch", 1000, 50).await;
    let affiliate = h.affiliate_program(5.0).await;
    let expired = affiliate_cookie(&affiliate, Some(Utc::now().timestamp_millis() - 1_000));

    for cookie in [
        None,
        Some("affiliate_ref=%7Bnot-json"),
        Some("affiliate_ref=%7B%22promoCode%22%3A%22ANN10%22%7D"),
        Some(expired.as_str()),
        Some("affiliate_ref="),
    ] {
        let order = h.place(order_body("watch", 1), cookie).await.unwrap();
        assert_eq!(order.affiliate_id, None, "{cookie:?}");
        assert_eq!(order.affiliate_commission, None);
    }

    h.settle().await;
    assert_eq!(h.count(CommissionRecord::COLLECTION).await, 0);
}

#[tokio::test]
async fn zero_percent_tier_attributes_without_commission() {
    let h = TestHarness::new();
    h.product("watch", 1000, 5).await;
    let affiliate = h.affiliate_program(0.0).await;
    let cookie = affiliate_cookie(&affiliate, None);

    let order = h.place(order_body("watch", 1), Some(&cookie)).await.unwrap();
    assert_eq!(order.affiliate_id, Some(affiliate.id));
    assert_eq!(order.affiliate_commission, None);

    h.settle().await;
    assert_eq!(h.count(CommissionRecord::COLLECTION).await, 0);
}

#[tokio::test]
async fn fanout_notifies_staff_and_sends_emails() {
    let h = TestHarness::new();
    h.email_provider().await;
    h.product("shirt", 500, 5).await;
    for (name, role) in [
        ("Mira", StaffRole::Merchant),
        ("Adam", StaffRole::Admin),
        ("Cora", StaffRole::Customer),
    ] {
        let user = StaffUser::new(name, format!("{}@shop.test", name.to_lowercase()), role);
        h.store.insert(&h.tenant, &user).await.unwrap();
    }

    let order = h.place(order_body("shirt", 1), None).await.unwrap();
    h.settle().await;

    let pushed = h.realtime.messages_for(RealtimeMessage::ORDER_CREATED).await;
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].payload["id"], json!(order.id.to_string()));
    assert_eq!(h.realtime.messages_for(RealtimeMessage::NOTIFICATION).await.len(), 2);

    let notifications: Vec<Notification> = h.store.find_as(&h.tenant, &Filter::new()).await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|n| !n.read));

    let sent = h.transport.sent().await;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().any(|s| s.email.to == "jane@example.com"
        && s.email.subject == format!("Your order {} has been placed", order.order_code)));
    assert_eq!(
        sent.iter()
            .filter(|s| s.email.subject == format!("New order {}", order.order_code))
            .count(),
        2
    );
}

#[tokio::test]
async fn missing_customer_email_skips_confirmation() {
    let h = TestHarness::new();
    h.email_provider().await;
    h.product("shirt", 500, 5).await;
    let mut body = order_body("shirt", 1);
    body["customer"]["email"] = Value::Null;

    h.place(body, None).await.unwrap();
    h.settle().await;
    assert_eq!(h.transport.sent_count().await, 0);
}

#[tokio::test]
async fn failing_branches_never_affect_the_order() {
    let h = TestHarness::new();
    h.product("watch", 1000, 5).await;
    let affiliate = h.affiliate_program(5.0).await;
    let staff = StaffUser::new("Mira", "mira@shop.test", StaffRole::Merchant);
    h.store.insert(&h.tenant, &staff).await.unwrap();
    // No email provider configured, so every email fails.
    h.realtime.set_fail(true).await;
    h.fraud.set_fail(true).await;
    h.conversion.set_fail(true).await;

    let cookie = affiliate_cookie(&affiliate, None);
    let order = h.place(order_body("watch", 1), Some(&cookie)).await.unwrap();
    h.settle().await;

    let stored: Order = h.store.get(&h.tenant, order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.fraud_check.is_none());
    assert_eq!(h.count(CommissionRecord::COLLECTION).await, 1);
    assert_eq!(h.count(Notification::COLLECTION).await, 1);
    // Initial attempt plus two retries.
    assert_eq!(h.fraud.lookups().await.len(), 3);
}

#[tokio::test]
async fn fraud_snapshot_is_attached_after_placement() {
    let h = TestHarness::new();
    h.product("shirt", 500, 5).await;
    h.fraud
        .set_report(json!({
            "totalParcels": 10,
            "successfulDeliveries": 4,
            "failedDeliveries": 6
        }))
        .await;

    let order = h.place(order_body("shirt", 1), None).await.unwrap();
    assert!(order.fraud_check.is_none());
    h.settle().await;

    let stored: Order = h.store.get(&h.tenant, order.id).await.unwrap().unwrap();
    let snapshot = stored.fraud_check.unwrap();
    assert_eq!(snapshot.total_parcels, 10);
    assert_eq!(snapshot.success_rate, 40.0);
    assert_eq!(snapshot.risk_tier, RiskTier::High);
    assert_eq!(h.fraud.lookups().await, vec!["01712345678".to_string()]);
}

#[tokio::test]
async fn only_cash_on_delivery_orders_are_tracked() {
    let h = TestHarness::new();
    h.product("shirt", 500, 5).await;

    let cod = h.place(order_body("shirt", 1), None).await.unwrap();
    let mut card = order_body("shirt", 1);
    card["paymentMethod"] = json!("card");
    h.place(card, None).await.unwrap();
    h.settle().await;

    let events = h.conversion.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, cod.id.to_string());
    assert_eq!(events[0].value, 500.0);
}

#[tokio::test]
async fn coupon_settings_and_vat_drive_totals() {
    let h = TestHarness::new();
    h.product("shirt", 1000, 5).await;
    let settings = StoreSettings {
        vat_percent: 5.0,
        shipping_inside: Money::from_units(60),
        shipping_outside: Money::from_units(120),
        home_city: Some("Dhaka".into()),
        order_code_prefix: Some("jd".into()),
        ..StoreSettings::default()
    };
    h.store.insert(&h.tenant, &settings).await.unwrap();
    h.store
        .insert(&h.tenant, &Coupon::new("save10", CouponKind::Percentage(10.0)))
        .await
        .unwrap();

    let mut body = order_body("shirt", 2);
    body["couponCode"] = json!("Save10");
    let order = h.place(body, None).await.unwrap();

    assert_eq!(order.subtotal, Money::from_units(2000));
    assert_eq!(order.discount_amount, Money::from_units(200));
    assert_eq!(order.vat_tax_amount, Money::from_units(90));
    assert_eq!(order.shipping, Money::from_units(60));
    assert_eq!(order.total, Money::from_units(1950));
    assert!(order.verify_total());
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
    assert!(order.order_code.starts_with("JD-000001"));
    h.settle().await;
}

#[tokio::test]
async fn unknown_or_inactive_coupon_is_a_validation_error() {
    let h = TestHarness::new();
    let product = h.product("shirt", 1000, 5).await;
    let mut inactive = Coupon::new("old", CouponKind::Fixed(Money::from_units(100)));
    inactive.is_active = false;
    h.store.insert(&h.tenant, &inactive).await.unwrap();

    for code in ["nope", "old"] {
        let mut body = order_body("shirt", 1);
        body["couponCode"] = json!(code);
        let err = h.place(body, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)), "{code}");
    }
    assert_eq!(h.stock_of(product.id).await, 5);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let h = TestHarness::new();
    let err = h.place(order_body("ghost", 1), None).await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));
}

#[tokio::test]
async fn unreachable_block_list_does_not_block_checkout() {
    let h = TestHarness::new();
    h.product("shirt", 500, 5).await;
    h.store.set_unavailable(BlockListEntry::COLLECTION, true).await;

    h.place(order_body("shirt", 1), None).await.unwrap();
    h.settle().await;
}

#[tokio::test]
async fn store_outage_fails_without_touching_stock() {
    let h = TestHarness::new();
    let product = h.product("shirt", 500, 5).await;
    h.store.set_unavailable(Order::COLLECTION, true).await;

    let err = h.place(order_body("shirt", 1), None).await.unwrap_err();
    assert_eq!(err.kind(), "internal_error");
    assert_eq!(h.stock_of(product.id).await, 5);
    assert_eq!(h.count(StockLedgerEntry::COLLECTION).await, 0);
}

#[tokio::test]
async fn ledger_outage_is_retried_until_the_entry_lands() {
    let h = TestHarness::with_retry(RetryPolicy {
        max_retries: 10,
        min_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    });
    let product = h.product("shirt", 500, 3).await;
    h.store.set_unavailable(StockLedgerEntry::COLLECTION, true).await;

    let order = h.place(order_body("shirt", 2), None).await.unwrap();
    assert_eq!(h.stock_of(product.id).await, 1);
    assert!(h.queue.pending() > 0);

    h.store.set_unavailable(StockLedgerEntry::COLLECTION, false).await;
    h.settle().await;

    let ledger: Vec<StockLedgerEntry> = h.store.find_as(&h.tenant, &Filter::new()).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].order_id, Some(order.id));
    assert_eq!(ledger[0].quantity, -2);
    assert_eq!(ledger[0].new_stock, 1);
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let h = TestHarness::new();
    let product = h.product("last-units", 100, 5).await;

    let attempts = (0..12).map(|_| {
        let pipeline = h.pipeline.clone();
        let ctx = h.ctx();
        async move {
            let request: CheckoutRequest =
                serde_json::from_value(order_body("last-units", 1)).unwrap();
            pipeline.place_order(&ctx, request, None).await
        }
    });
    let results = futures_util::future::join_all(attempts).await;

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 5);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        CheckoutError::InsufficientStock { .. }
    )));
    assert_eq!(h.stock_of(product.id).await, 0);

    let ledger: Vec<StockLedgerEntry> = h.store.find_as(&h.tenant, &Filter::new()).await.unwrap();
    let delta: i64 = ledger.iter().map(|e| e.quantity).sum();
    assert_eq!(5 + delta, h.stock_of(product.id).await);
    h.settle().await;
}

#[tokio::test]
async fn orders_are_tenant_scoped() {
    let h = TestHarness::new();
    h.product("shirt", 500, 5).await;

    let other = TenantContext::new(TenantId::new("shop-2").unwrap());
    let request: CheckoutRequest = serde_json::from_value(order_body("shirt", 1)).unwrap();
    let err = h.pipeline.place_order(&other, request, None).await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));
}
