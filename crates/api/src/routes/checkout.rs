//! Storefront checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};
use checkout::CheckoutRequest;
use domain::Order;
use store::DocumentStore;

use crate::AppState;
use crate::error::ApiError;
use crate::tenant::Tenant;

/// POST /checkout
///
/// The raw `Cookie` header is handed to the pipeline undecoded; the
/// affiliate token decoder owns percent-decoding.
pub async fn place<St: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Tenant(ctx): Tenant,
    headers: HeaderMap,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());

    let order = state.pipeline.place_order(&ctx, request, cookie).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
