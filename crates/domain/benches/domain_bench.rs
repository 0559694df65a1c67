use common::{DocumentId, TenantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AffiliateSettings, CommissionTier, CustomerSnapshot, LineItem, Money, Order, OrderTotals,
    PaymentMethod, Product, StockLedgerEntry,
};
use store::{Adjustment, DocumentStore, DocumentStoreExt, IncrementGuard, InMemoryDocumentStore};

fn line_items(n: u32) -> Vec<LineItem> {
    (1..=n)
        .map(|i| LineItem {
            product_id: DocumentId::new(),
            name: format!("Product {i}"),
            unit_price: Money::from_cents(i64::from(i) * 100),
            quantity: i % 3 + 1,
            size: None,
            color: None,
        })
        .collect()
}

fn bench_order_totals(c: &mut Criterion) {
    let items = line_items(50);

    c.bench_function("domain/order_totals_50_items", |b| {
        b.iter(|| {
            OrderTotals::compute(
                std::hint::black_box(&items),
                Money::from_units(25),
                7.5,
                Money::from_units(60),
            )
        });
    });
}

fn bench_commission(c: &mut Criterion) {
    let settings = AffiliateSettings::enabled_with(
        (1..=10)
            .map(|level| CommissionTier {
                level,
                percentage: f64::from(level) * 1.5,
            })
            .collect(),
    );

    c.bench_function("domain/commission_lookup", |b| {
        b.iter(|| settings.commission_for(std::hint::black_box(7), Money::from_units(1000)));
    });
}

fn bench_order_serialization(c: &mut Criterion) {
    let items = line_items(10);
    let totals = OrderTotals::compute(&items, Money::zero(), 5.0, Money::from_units(60));
    let order = Order::new(
        "BEN-000001aa",
        items,
        totals,
        PaymentMethod::CashOnDelivery,
        CustomerSnapshot {
            name: "Bench".into(),
            phone: "01700000000".into(),
            email: None,
            address: "Road 1".into(),
            city: "Dhaka".into(),
            postal_code: "1000".into(),
        },
    );

    c.bench_function("domain/order_to_json", |b| {
        b.iter(|| serde_json::to_value(std::hint::black_box(&order)).unwrap());
    });
}

fn bench_reserve_and_record(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let tenant = TenantId::new("bench").unwrap();
    let product = Product::new("Widget", "widget", Money::from_units(10), i64::MAX / 2);
    rt.block_on(async { store.insert(&tenant, &product).await.unwrap() });

    c.bench_function("domain/reserve_and_record", |b| {
        b.iter(|| {
            rt.block_on(async {
                let adjustment: Adjustment = store
                    .increment(
                        &tenant,
                        "products",
                        product.id,
                        Product::STOCK_FIELD,
                        -1,
                        IncrementGuard::AtLeast(1),
                    )
                    .await
                    .unwrap()
                    .unwrap();
                let entry = StockLedgerEntry::for_order(
                    product.id,
                    &product.name,
                    adjustment,
                    DocumentId::new(),
                );
                store.insert(&tenant, &entry).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_totals,
    bench_commission,
    bench_order_serialization,
    bench_reserve_and_record,
);
criterion_main!(benches);
