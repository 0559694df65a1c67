//! Checkout request intake: validation and product resolution.
//!
//! Client-supplied prices are accepted in the payload for compatibility but
//! never read; unit prices always come from the stored product.

use common::{DocumentId, TenantId};
use domain::{CustomerSnapshot, LineItem, OrderChannel, PaymentMethod, Product, SourceTracking};
use serde::Deserialize;
use store::{DocumentStore, DocumentStoreExt, Filter};
use validator::{Validate, ValidationError};

use crate::error::{CheckoutError, Result};

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// One cart line as submitted by the storefront.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Browsing-time price echo. Ignored.
    #[serde(default)]
    pub price: Option<f64>,
}

/// Customer details entered at checkout.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub phone: String,
    #[serde(default)]
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub address: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub city: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub postal_code: String,
}

impl CustomerRequest {
    fn into_snapshot(self) -> CustomerSnapshot {
        CustomerSnapshot {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        }
    }
}

/// Body of `POST /checkout`.
///
/// Either `items` (a full cart) or `productSlug` + `quantity` (the direct
/// "place order" shortcut) must be present.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub product_slug: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub customer: CustomerRequest,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub channel: OrderChannel,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub source_tracking: Option<SourceTracking>,
}

/// How a line refers to its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Id(DocumentId),
    Slug(String),
}

/// A validated, not yet priced line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product: ProductRef,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// A line resolved against the catalog.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: Product,
    pub item: LineItem,
}

/// Everything intake hands to the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub lines: Vec<LineRequest>,
    pub customer: CustomerSnapshot,
    pub payment_method: PaymentMethod,
    pub channel: OrderChannel,
    pub coupon_code: Option<String>,
    pub source_tracking: Option<SourceTracking>,
}

fn quantity(value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| CheckoutError::Validation(format!("invalid quantity {value}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CheckoutRequest {
    /// Validates the request and normalizes it into line requests.
    pub fn into_validated(self) -> Result<ValidatedCheckout> {
        self.validate()?;

        let lines = if !self.items.is_empty() {
            self.items
                .into_iter()
                .map(|item| {
                    let product = match (non_blank(item.product_id), non_blank(item.slug)) {
                        (Some(id), _) => DocumentId::parse(&id).map(ProductRef::Id).ok_or_else(
                            || CheckoutError::NotFound(format!("product {id}")),
                        )?,
                        (None, Some(slug)) => ProductRef::Slug(slug),
                        (None, None) => {
                            return Err(CheckoutError::Validation(
                                "line item is missing a product".into(),
                            ));
                        }
                    };
                    Ok(LineRequest {
                        product,
                        quantity: quantity(item.quantity)?,
                        size: non_blank(item.size),
                        color: non_blank(item.color),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else if let Some(slug) = non_blank(self.product_slug) {
            vec![LineRequest {
                product: ProductRef::Slug(slug),
                quantity: quantity(self.quantity.unwrap_or(1))?,
                size: non_blank(self.size),
                color: non_blank(self.color),
            }]
        } else {
            return Err(CheckoutError::Validation("no products in order".into()));
        };

        Ok(ValidatedCheckout {
            lines,
            customer: self.customer.into_snapshot(),
            payment_method: self.payment_method,
            channel: self.channel,
            coupon_code: non_blank(self.coupon_code).map(|c| c.to_uppercase()),
            source_tracking: self.source_tracking.filter(|t| !t.is_empty()),
        })
    }
}

/// Resolves every line against the tenant's catalog and prices it.
///
/// Unknown or inactive products yield [`CheckoutError::NotFound`].
#[tracing::instrument(skip(store, lines), fields(tenant_id = %tenant, lines = lines.len()))]
pub async fn resolve_lines<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    lines: &[LineRequest],
) -> Result<Vec<PricedLine>> {
    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        let product: Option<Product> = match &line.product {
            ProductRef::Id(id) => store.get(tenant, *id).await?,
            ProductRef::Slug(slug) => {
                store
                    .find_one_as(tenant, &Filter::new().eq("slug", slug.as_str()))
                    .await?
            }
        };

        let product = product.filter(|p| p.is_active).ok_or_else(|| {
            CheckoutError::NotFound(match &line.product {
                ProductRef::Id(id) => format!("product {id}"),
                ProductRef::Slug(slug) => format!("product {slug}"),
            })
        })?;

        let item = LineItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.unit_price(),
            quantity: line.quantity,
            size: line.size.clone(),
            color: line.color.clone(),
        };
        priced.push(PricedLine { product, item });
    }

    Ok(priced)
}
