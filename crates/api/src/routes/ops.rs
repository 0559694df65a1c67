//! Health and Prometheus metrics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use store::DocumentStore;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Background fan-out jobs not yet finished.
    pub pending_tasks: usize,
}

/// GET /health
pub async fn health<St: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<St>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pending_tasks: state.pipeline.fanout().queue().pending(),
    })
}

/// GET /metrics
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
