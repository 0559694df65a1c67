use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::DocumentId;
use tokio::sync::RwLock;

use super::{EmailTransport, SendReceipt};
use crate::error::MailerError;
use crate::provider::{ProviderKind, ResolvedProvider};
use crate::template::RenderedEmail;

/// An email accepted by the in-memory transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub provider_id: DocumentId,
    pub provider: ProviderKind,
    pub email: RenderedEmail,
}

#[derive(Debug, Default)]
struct InMemoryTransportState {
    sent: Vec<SentEmail>,
    failing: HashSet<DocumentId>,
    fail_all: bool,
}

/// In-memory email transport for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailTransport {
    state: Arc<RwLock<InMemoryTransportState>>,
}

impl InMemoryEmailTransport {
    /// Creates a new in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures sends and tests through one provider to fail.
    pub async fn set_fail_for(&self, provider_id: DocumentId, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failing.insert(provider_id);
        } else {
            state.failing.remove(&provider_id);
        }
    }

    /// Configures every provider to fail.
    pub async fn set_fail_all(&self, fail: bool) {
        self.state.write().await.fail_all = fail;
    }

    /// Returns every email accepted so far.
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.state.read().await.sent.clone()
    }

    /// Returns the number of emails accepted so far.
    pub async fn sent_count(&self) -> usize {
        self.state.read().await.sent.len()
    }

    async fn check(&self, provider: &ResolvedProvider) -> Result<(), MailerError> {
        let state = self.state.read().await;
        if state.fail_all || state.failing.contains(&provider.id) {
            return Err(MailerError::Rejected {
                provider: provider.kind(),
                status: 503,
                body: "simulated provider failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for InMemoryEmailTransport {
    async fn send(
        &self,
        provider: &ResolvedProvider,
        email: &RenderedEmail,
    ) -> Result<SendReceipt, MailerError> {
        self.check(provider).await?;

        let mut state = self.state.write().await;
        state.sent.push(SentEmail {
            provider_id: provider.id,
            provider: provider.kind(),
            email: email.clone(),
        });
        Ok(SendReceipt {
            message_id: Some(format!("mem-{}", state.sent.len())),
        })
    }

    async fn test(&self, provider: &ResolvedProvider) -> Result<(), MailerError> {
        self.check(provider).await
    }
}
