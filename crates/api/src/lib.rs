//! HTTP API server for the multi-tenant checkout pipeline.
//!
//! Exposes `POST /checkout` and `GET /orders/{id}` behind a tenant resolver,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod tenant;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    BroadcastRealtimeChannel, CheckoutPipeline, ConversionTracker, FanoutDispatcher,
    FanoutServices, FraudScoreService, HttpConversionTracker, HttpFraudScoreService, TaskQueue,
};
use common::TenantId;
use mailer::{EmailDispatcher, EmailTransport, ProviderTransport, SecretCipher};
use metrics_exporter_prometheus::PrometheusHandle;
use store::DocumentStore;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::ApiError;

/// Capacity of the real-time broadcast channel.
const REALTIME_CAPACITY: usize = 256;

/// Shared application state.
pub struct AppState<St: DocumentStore + Clone + 'static> {
    pub pipeline: CheckoutPipeline<St>,
    pub store: St,
    /// Tenant used when a request carries no `x-tenant-id` header.
    pub default_tenant: Option<TenantId>,
}

impl<St: DocumentStore + Clone + 'static> AppState<St> {
    /// Background task queue of the fan-out.
    pub fn queue(&self) -> &TaskQueue {
        self.pipeline.fanout().queue()
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<St: DocumentStore + Clone + 'static>(
    state: Arc<AppState<St>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<St>))
        .route("/checkout", post(routes::checkout::place::<St>))
        .route("/orders/{id}", get(routes::orders::get::<St>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with HTTP-backed collaborators.
///
/// The fraud score and conversion clients are only built when their
/// endpoints are configured. Must be called inside a Tokio runtime; the
/// returned handle is the task queue worker.
pub fn create_default_state<St: DocumentStore + Clone + 'static>(
    store: St,
    config: &Config,
) -> Result<(Arc<AppState<St>>, JoinHandle<()>), ApiError> {
    let transport = ProviderTransport::new().map_err(|e| ApiError::Internal(e.to_string()))?;

    let fraud = match &config.fraud_api_url {
        Some(url) => {
            let service = HttpFraudScoreService::new(
                url.clone(),
                config.fraud_api_key.clone(),
                Duration::from_secs(config.fraud_timeout_secs),
            )?;
            Some(Arc::new(service) as Arc<dyn FraudScoreService>)
        }
        None => {
            tracing::info!("FRAUD_API_URL not set, fraud enrichment disabled");
            None
        }
    };

    let conversion = match &config.conversion_endpoint {
        Some(endpoint) => {
            let tracker = HttpConversionTracker::new(endpoint.clone())?;
            Some(Arc::new(tracker) as Arc<dyn ConversionTracker>)
        }
        None => None,
    };

    let services = FanoutServices {
        realtime: Arc::new(BroadcastRealtimeChannel::new(REALTIME_CAPACITY)),
        fraud,
        conversion,
    };

    Ok(create_state_with(store, config, Arc::new(transport), services))
}

/// Creates the application state around the given collaborators.
pub fn create_state_with<St: DocumentStore + Clone + 'static>(
    store: St,
    config: &Config,
    transport: Arc<dyn EmailTransport>,
    services: FanoutServices,
) -> (Arc<AppState<St>>, JoinHandle<()>) {
    let checkout_config = config.checkout_config();
    let mailer = Arc::new(EmailDispatcher::new(
        store.clone(),
        transport,
        SecretCipher::new(&config.secret_key),
    ));
    let (queue, worker) = TaskQueue::start(checkout_config.queue_capacity, checkout_config.retry);
    let fanout = FanoutDispatcher::new(
        store.clone(),
        mailer,
        services,
        queue,
        checkout_config.fraud_timeout,
        checkout_config.store_name.clone(),
    );

    let state = Arc::new(AppState {
        pipeline: CheckoutPipeline::new(store.clone(), fanout, checkout_config),
        store,
        default_tenant: config.default_tenant.clone().and_then(TenantId::new),
    });

    (state, worker)
}
