//! Order lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::DocumentId;
use domain::{Order, OrderStatus};
use serde::Serialize;
use store::{DocumentStore, DocumentStoreExt};

use crate::AppState;
use crate::error::ApiError;
use crate::tenant::Tenant;

/// An order as shown to clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    /// Display status; see [`Order::effective_status`].
    pub effective_status: OrderStatus,
}

/// GET /orders/{id}
pub async fn get<St: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Tenant(ctx): Tenant,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = DocumentId::parse(&id)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid order id: {id}")))?;

    let order: Order = state
        .store
        .get(ctx.tenant_id(), order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))?;

    let effective_status = order.effective_status();
    Ok(Json(OrderResponse {
        order,
        effective_status,
    }))
}
