//! Transactional email with provider failover.
//!
//! Each tenant configures one primary provider and optionally one fallback.
//! [`EmailDispatcher`] renders `{{name}}` templates, opens sealed
//! credentials at send time, and retries once on the fallback when the
//! primary fails. Failures are returned as [`DeliveryResult`] values.

pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod secrets;
pub mod template;
pub mod transport;

pub use dispatcher::{DeliveryResult, EmailDispatcher};
pub use error::MailerError;
pub use provider::{
    ProviderConfig, ProviderKind, ProviderRole, ProviderSettings, ResolvedCredentials,
    ResolvedProvider,
};
pub use secrets::{SealedSecret, SecretCipher};
pub use template::{EmailTemplate, RenderedEmail, TemplateVars, render};
pub use transport::{
    ApiEndpoints, EmailTransport, InMemoryEmailTransport, ProviderTransport, SendReceipt,
    SentEmail,
};
