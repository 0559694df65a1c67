//! Real-time push to dashboards.
//!
//! Publishing is fire-and-forget: no delivery acknowledgment is expected.

use std::sync::Arc;

use async_trait::async_trait;
use common::{DocumentId, TenantId};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use crate::error::CheckoutError;

/// A message for every dashboard of a tenant, or for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DocumentId>,
    pub event: String,
    pub payload: Value,
}

impl RealtimeMessage {
    pub const ORDER_CREATED: &'static str = "order:created";
    pub const NOTIFICATION: &'static str = "notification:new";

    /// Message for the tenant's shared dashboard channel.
    pub fn to_tenant(tenant_id: TenantId, event: &str, payload: Value) -> Self {
        Self {
            tenant_id,
            user_id: None,
            event: event.to_string(),
            payload,
        }
    }

    /// Message for one user's channel.
    pub fn to_user(tenant_id: TenantId, user_id: DocumentId, event: &str, payload: Value) -> Self {
        Self {
            tenant_id,
            user_id: Some(user_id),
            event: event.to_string(),
            payload,
        }
    }
}

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn publish(&self, message: RealtimeMessage) -> Result<(), CheckoutError>;
}

/// In-process hub backed by a tokio broadcast channel.
///
/// Subscribers (e.g. SSE or websocket handlers) filter by tenant and user.
#[derive(Debug, Clone)]
pub struct BroadcastRealtimeChannel {
    sender: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastRealtimeChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl RealtimeChannel for BroadcastRealtimeChannel {
    async fn publish(&self, message: RealtimeMessage) -> Result<(), CheckoutError> {
        let event = message.event.clone();
        match self.sender.send(message) {
            Ok(receivers) => tracing::trace!(%event, receivers, "realtime message published"),
            // No connected dashboards.
            Err(_) => tracing::trace!(%event, "realtime message dropped, no subscribers"),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryRealtimeState {
    messages: Vec<RealtimeMessage>,
    fail: bool,
}

/// Recording channel for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRealtimeChannel {
    state: Arc<RwLock<InMemoryRealtimeState>>,
}

impl InMemoryRealtimeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every publish to fail.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Returns every message published so far.
    pub async fn messages(&self) -> Vec<RealtimeMessage> {
        self.state.read().await.messages.clone()
    }

    /// Returns the messages published under one event name.
    pub async fn messages_for(&self, event: &str) -> Vec<RealtimeMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.event == event)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RealtimeChannel for InMemoryRealtimeChannel {
    async fn publish(&self, message: RealtimeMessage) -> Result<(), CheckoutError> {
        let mut state = self.state.write().await;
        if state.fail {
            return Err(CheckoutError::Realtime("simulated failure".into()));
        }
        state.messages.push(message);
        Ok(())
    }
}
