//! HTTP collaborator clients against a local stand-in server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use checkout::{
    CheckoutError, ConversionEvent, ConversionTracker, FraudScoreService, HttpConversionTracker,
    HttpFraudScoreService,
};
use common::{DocumentId, TenantId};
use domain::{
    CustomerSnapshot, LineItem, Money, Order, OrderTotals, PaymentMethod, RiskTier,
};
use serde_json::{Value, json};

type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn capture(path: &str, reply: Value) -> (Router, Captured) {
    let captured: Captured = Arc::default();
    let sink = captured.clone();
    let app = Router::new().route(
        path,
        post(move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| {
            let sink = sink.clone();
            let reply = reply.clone();
            async move {
                sink.lock().unwrap().push((headers, body));
                axum::Json(reply)
            }
        }),
    );
    (app, captured)
}

fn order() -> Order {
    let items = vec![LineItem {
        product_id: DocumentId::new(),
        name: "Shirt".into(),
        unit_price: Money::from_units(500),
        quantity: 2,
        size: None,
        color: None,
    }];
    let totals = OrderTotals::compute(&items, Money::zero(), 0.0, Money::zero());
    Order::new(
        "SHO-000001ab",
        items,
        totals,
        PaymentMethod::CashOnDelivery,
        CustomerSnapshot {
            name: "Jane Doe".into(),
            phone: "01712345678".into(),
            email: Some(" Jane@Example.com ".into()),
            address: "Road 1".into(),
            city: "Dhaka".into(),
            postal_code: "1207".into(),
        },
    )
}

#[tokio::test]
async fn fraud_lookup_posts_phone_with_bearer_key() {
    let (app, captured) = capture(
        "/check",
        json!({"data": {"totalParcels": 10, "successfulDeliveries": 4, "failedDeliveries": 6}}),
    );
    let base = spawn(app).await;
    let service = HttpFraudScoreService::new(
        format!("{base}/check"),
        Some("fraud-key".into()),
        Duration::from_secs(2),
    )
    .unwrap();

    let snapshot = service.lookup("01712345678").await.unwrap();
    assert_eq!(snapshot.total_parcels, 10);
    assert_eq!(snapshot.risk_tier, RiskTier::High);

    let requests = captured.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["authorization"], "Bearer fraud-key");
    assert_eq!(body["phone"], "01712345678");
}

#[tokio::test]
async fn fraud_lookup_rejection_is_an_error() {
    let app = Router::new().route(
        "/check",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let base = spawn(app).await;
    let service =
        HttpFraudScoreService::new(format!("{base}/check"), None, Duration::from_secs(2)).unwrap();

    let err = service.lookup("01712345678").await.unwrap_err();
    assert!(matches!(err, CheckoutError::FraudService(ref msg) if msg.contains("429")));
}

#[tokio::test]
async fn conversion_event_is_posted_with_hashed_identifiers() {
    let (app, captured) = capture("/events", json!({"ok": true}));
    let base = spawn(app).await;
    let tracker = HttpConversionTracker::new(format!("{base}/events")).unwrap();
    let order = order();
    let tenant = TenantId::new("shop-1").unwrap();

    tracker
        .track(&tenant, &ConversionEvent::purchase(&order))
        .await
        .unwrap();

    let requests = captured.lock().unwrap();
    let (_, body) = &requests[0];
    assert_eq!(body["tenantId"], "shop-1");
    let event = &body["data"][0];
    assert_eq!(event["eventName"], "Purchase");
    assert_eq!(event["eventId"], order.id.to_string());
    assert_eq!(event["value"], 1000.0);
    // Emails are trimmed and lowercased before hashing.
    let expected = ConversionEvent::purchase(&Order {
        customer: CustomerSnapshot {
            email: Some("jane@example.com".into()),
            ..order.customer.clone()
        },
        ..order.clone()
    });
    assert_eq!(event["hashedEmail"], json!(expected.hashed_email));
    assert_ne!(event["hashedPhone"], "01712345678");
}

#[tokio::test]
async fn conversion_rejection_is_an_error() {
    let app = Router::new().route(
        "/events",
        post(|| async { (StatusCode::BAD_REQUEST, "bad event") }),
    );
    let base = spawn(app).await;
    let tracker = HttpConversionTracker::new(format!("{base}/events")).unwrap();

    let err = tracker
        .track(
            &TenantId::new("shop-1").unwrap(),
            &ConversionEvent::purchase(&order()),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad event"));
}
