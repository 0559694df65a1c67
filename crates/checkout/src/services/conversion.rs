//! Server-side purchase conversion tracking for cash-on-delivery orders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::TenantId;
use domain::Order;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::snippet;
use crate::error::CheckoutError;

fn hashed(value: &str) -> Option<String> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    Some(format!("{:x}", Sha256::digest(normalized.as_bytes())))
}

/// One purchase event. Customer identifiers are SHA-256 hashed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEvent {
    pub event_name: String,
    /// Deduplication key; the order id.
    pub event_id: String,
    pub event_time: i64,
    pub order_code: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,
}

impl ConversionEvent {
    pub fn purchase(order: &Order) -> Self {
        let tracking = order.source_tracking.clone().unwrap_or_default();
        Self {
            event_name: "Purchase".to_string(),
            event_id: order.id.to_string(),
            event_time: order.created_at.timestamp(),
            order_code: order.order_code.clone(),
            value: order.total.as_major(),
            hashed_phone: hashed(&order.customer.phone),
            hashed_email: order.customer.email.as_deref().and_then(hashed),
            fbclid: tracking.fbclid,
            gclid: tracking.gclid,
            utm_source: tracking.utm_source,
            utm_campaign: tracking.utm_campaign,
            landing_page: tracking.landing_page,
        }
    }
}

#[async_trait]
pub trait ConversionTracker: Send + Sync {
    async fn track(&self, tenant: &TenantId, event: &ConversionEvent) -> Result<(), CheckoutError>;
}

/// Posts events to a conversion collector endpoint.
#[derive(Debug, Clone)]
pub struct HttpConversionTracker {
    client: Client,
    endpoint: String,
}

impl HttpConversionTracker {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CheckoutError::ConversionTracking(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ConversionTracker for HttpConversionTracker {
    #[tracing::instrument(skip(self, event), fields(tenant_id = %tenant, event_id = %event.event_id))]
    async fn track(&self, tenant: &TenantId, event: &ConversionEvent) -> Result<(), CheckoutError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "tenantId": tenant, "data": [event] }))
            .send()
            .await
            .map_err(|e| CheckoutError::ConversionTracking(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CheckoutError::ConversionTracking(format!(
                "status {}: {}",
                status.as_u16(),
                snippet(&body)
            )))
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryConversionState {
    events: Vec<(TenantId, ConversionEvent)>,
    fail: bool,
}

/// In-memory conversion tracker for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversionTracker {
    state: Arc<RwLock<InMemoryConversionState>>,
}

impl InMemoryConversionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    pub async fn events(&self) -> Vec<ConversionEvent> {
        self.state
            .read()
            .await
            .events
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl ConversionTracker for InMemoryConversionTracker {
    async fn track(&self, tenant: &TenantId, event: &ConversionEvent) -> Result<(), CheckoutError> {
        let mut state = self.state.write().await;
        if state.fail {
            return Err(CheckoutError::ConversionTracking("simulated failure".into()));
        }
        state.events.push((tenant.clone(), event.clone()));
        Ok(())
    }
}
