//! Provider transports.
//!
//! [`EmailTransport`] is the two-operation capability every provider kind
//! offers. [`ProviderTransport`] dispatches to the concrete integration by
//! matching on the resolved provider kind.

mod memory;
mod postmark;
mod sendgrid;
mod ses;
mod smtp;

pub use memory::{InMemoryEmailTransport, SentEmail};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::MailerError;
use crate::provider::{ResolvedCredentials, ResolvedProvider};
use crate::template::RenderedEmail;

/// Successful hand-off to a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Send and test operations over a resolved provider.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Sends one rendered email.
    async fn send(
        &self,
        provider: &ResolvedProvider,
        email: &RenderedEmail,
    ) -> Result<SendReceipt, MailerError>;

    /// Verifies that the credentials are accepted, without sending mail.
    async fn test(&self, provider: &ResolvedProvider) -> Result<(), MailerError>;
}

/// Base URLs of the HTTP email APIs.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub sendgrid: String,
    pub postmark: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            sendgrid: "https://api.sendgrid.com".to_string(),
            postmark: "https://api.postmarkapp.com".to_string(),
        }
    }
}

/// Real transport talking to SMTP servers and provider APIs.
#[derive(Debug, Clone)]
pub struct ProviderTransport {
    client: Client,
    endpoints: ApiEndpoints,
}

impl ProviderTransport {
    /// Creates a transport using the public API endpoints.
    pub fn new() -> Result<Self, MailerError> {
        Self::with_endpoints(ApiEndpoints::default())
    }

    /// Creates a transport with custom API base URLs.
    pub fn with_endpoints(endpoints: ApiEndpoints) -> Result<Self, MailerError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl EmailTransport for ProviderTransport {
    #[tracing::instrument(skip(self, email), fields(provider = %provider.kind(), to = %email.to))]
    async fn send(
        &self,
        provider: &ResolvedProvider,
        email: &RenderedEmail,
    ) -> Result<SendReceipt, MailerError> {
        match &provider.credentials {
            ResolvedCredentials::Smtp {
                host,
                port,
                login,
                secure,
            } => smtp::send(host, *port, login.as_ref(), *secure, provider, email).await,
            ResolvedCredentials::Sendgrid {
                api_key,
                categories,
            } => {
                sendgrid::send(
                    &self.client,
                    &self.endpoints.sendgrid,
                    api_key,
                    categories,
                    provider,
                    email,
                )
                .await
            }
            ResolvedCredentials::Postmark {
                server_token,
                message_stream,
            } => {
                postmark::send(
                    &self.client,
                    &self.endpoints.postmark,
                    server_token,
                    message_stream,
                    provider,
                    email,
                )
                .await
            }
            ResolvedCredentials::Ses {
                region,
                access_key_id,
                secret_access_key,
                configuration_set,
            } => {
                let client = ses::client(region, access_key_id, secret_access_key);
                ses::send(&client, configuration_set.as_deref(), provider, email).await
            }
        }
    }

    #[tracing::instrument(skip(self), fields(provider = %provider.kind()))]
    async fn test(&self, provider: &ResolvedProvider) -> Result<(), MailerError> {
        match &provider.credentials {
            ResolvedCredentials::Smtp {
                host,
                port,
                login,
                secure,
            } => smtp::test(host, *port, login.as_ref(), *secure).await,
            ResolvedCredentials::Sendgrid { api_key, .. } => {
                sendgrid::test(&self.client, &self.endpoints.sendgrid, api_key).await
            }
            ResolvedCredentials::Postmark { server_token, .. } => {
                postmark::test(&self.client, &self.endpoints.postmark, server_token).await
            }
            ResolvedCredentials::Ses {
                region,
                access_key_id,
                secret_access_key,
                ..
            } => {
                let client = ses::client(region, access_key_id, secret_access_key);
                ses::test(&client).await
            }
        }
    }
}

/// `"Name <email>"` or the bare address.
pub(crate) fn from_header(provider: &ResolvedProvider) -> String {
    match provider.from_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("{name} <{}>", provider.from_email),
        _ => provider.from_email.clone(),
    }
}

/// Truncates a provider error body for logs and results.
pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
