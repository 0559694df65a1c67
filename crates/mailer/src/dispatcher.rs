//! Primary/fallback email delivery.

use std::sync::Arc;

use common::{DocumentId, TenantId};
use serde::Serialize;
use store::{Document, DocumentStore, DocumentStoreExt, Filter};

use crate::error::MailerError;
use crate::provider::{ProviderConfig, ProviderKind, ProviderRole, ResolvedProvider};
use crate::secrets::SecretCipher;
use crate::template::{EmailTemplate, RenderedEmail, TemplateVars};
use crate::transport::{EmailTransport, SendReceipt};

/// Outcome of a send or test. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    fn delivered(provider: ProviderKind, receipt: SendReceipt) -> Self {
        Self {
            ok: true,
            provider: Some(provider),
            message_id: receipt.message_id,
            error: None,
        }
    }

    fn failed(provider: Option<ProviderKind>, error: impl ToString) -> Self {
        Self {
            ok: false,
            provider,
            message_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// The tenant's provider selection.
#[derive(Debug)]
struct ProviderSelection {
    primary: Option<ProviderConfig>,
    fallback: Option<ProviderConfig>,
}

/// Sends email through the tenant's primary provider, failing over once to
/// a distinct, enabled fallback.
pub struct EmailDispatcher<S: DocumentStore> {
    store: S,
    transport: Arc<dyn EmailTransport>,
    cipher: SecretCipher,
}

impl<S: DocumentStore> EmailDispatcher<S> {
    /// Creates a new dispatcher.
    pub fn new(store: S, transport: Arc<dyn EmailTransport>, cipher: SecretCipher) -> Self {
        Self {
            store,
            transport,
            cipher,
        }
    }

    /// Renders a template for one recipient and sends it.
    #[tracing::instrument(skip(self, template, vars), fields(tenant_id = %tenant))]
    pub async fn send_templated_email(
        &self,
        tenant: &TenantId,
        to: &str,
        template: &EmailTemplate,
        vars: &TemplateVars,
    ) -> DeliveryResult {
        let email = template.render(to, vars);
        self.send_email(tenant, &email).await
    }

    /// Sends an already rendered email with failover.
    ///
    /// On double failure the result carries the primary's error; the
    /// fallback's error is only logged.
    #[tracing::instrument(skip(self, email), fields(tenant_id = %tenant, to = %email.to))]
    pub async fn send_email(&self, tenant: &TenantId, email: &RenderedEmail) -> DeliveryResult {
        let selection = match self.select_providers(tenant).await {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load email providers");
                return DeliveryResult::failed(None, e);
            }
        };

        let primary_kind = selection.primary.as_ref().map(ProviderConfig::kind);
        let primary_error = match &selection.primary {
            Some(primary) => match self.attempt(primary, email).await {
                Ok(receipt) => return DeliveryResult::delivered(primary.kind(), receipt),
                Err(e) => e,
            },
            None => MailerError::NoPrimaryProvider,
        };

        tracing::warn!(
            provider = ?primary_kind,
            error = %primary_error,
            "primary email provider failed"
        );

        let primary_id = selection.primary.as_ref().map(|p| p.id);
        let Some(fallback) = selection
            .fallback
            .filter(|f| f.is_enabled() && Some(f.id) != primary_id)
        else {
            return DeliveryResult::failed(primary_kind, primary_error);
        };

        metrics::counter!("email_failover_total").increment(1);
        match self.attempt(&fallback, email).await {
            Ok(receipt) => {
                tracing::info!(provider = %fallback.kind(), "email delivered by fallback provider");
                DeliveryResult::delivered(fallback.kind(), receipt)
            }
            Err(fallback_error) => {
                tracing::error!(
                    provider = %fallback.kind(),
                    error = %fallback_error,
                    "fallback email provider failed"
                );
                DeliveryResult::failed(primary_kind, primary_error)
            }
        }
    }

    /// Runs a provider's credential test.
    #[tracing::instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn test_provider(&self, tenant: &TenantId, provider_id: DocumentId) -> DeliveryResult {
        let config: ProviderConfig = match self.store.get(tenant, provider_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                return DeliveryResult::failed(None, format!("Email provider {provider_id} not found"));
            }
            Err(e) => return DeliveryResult::failed(None, e),
        };

        let kind = config.kind();
        let result = match self.resolve(&config) {
            Ok(resolved) => self.transport.test(&resolved).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => DeliveryResult::delivered(kind, SendReceipt::default()),
            Err(e) => DeliveryResult::failed(Some(kind), e),
        }
    }

    async fn select_providers(&self, tenant: &TenantId) -> Result<ProviderSelection, MailerError> {
        let documents = self
            .store
            .find(tenant, ProviderConfig::COLLECTION, &Filter::new())
            .await?;
        // Unreadable documents are skipped one by one.
        let configs: Vec<ProviderConfig> = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get("id").cloned();
                match serde_json::from_value(doc) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        metrics::counter!("email_provider_config_errors_total").increment(1);
                        tracing::warn!(provider_id = ?id, error = %e, "skipping unreadable email provider config");
                        None
                    }
                }
            })
            .collect();

        let (primaries, others): (Vec<_>, Vec<_>) = configs
            .into_iter()
            .partition(|c| c.role == ProviderRole::Primary);

        // A disabled primary is still selected so its failure gets reported.
        let primary = match primaries.iter().position(ProviderConfig::is_enabled) {
            Some(index) => primaries.into_iter().nth(index),
            None => primaries.into_iter().next(),
        };
        let fallback = others
            .into_iter()
            .find(|c| c.role == ProviderRole::Fallback && c.is_enabled());

        Ok(ProviderSelection { primary, fallback })
    }

    fn resolve(&self, config: &ProviderConfig) -> Result<ResolvedProvider, MailerError> {
        config.resolve(&self.cipher).inspect_err(|e| {
            if matches!(e, MailerError::Secret(_)) {
                tracing::error!(
                    provider = %config.kind(),
                    provider_id = %config.id,
                    error = %e,
                    "critical: email provider secret could not be decrypted"
                );
            }
        })
    }

    async fn attempt(
        &self,
        config: &ProviderConfig,
        email: &RenderedEmail,
    ) -> Result<SendReceipt, MailerError> {
        let kind = config.kind();
        let result = async {
            if !config.is_enabled() {
                return Err(MailerError::ProviderDisabled(kind));
            }
            let resolved = self.resolve(config)?;
            self.transport.send(&resolved, email).await
        }
        .await;

        let outcome = if result.is_ok() { "sent" } else { "failed" };
        metrics::counter!("email_send_total", "provider" => kind.as_str(), "outcome" => outcome)
            .increment(1);
        result
    }
}
