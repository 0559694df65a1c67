use store::StoreError;
use thiserror::Error;

use crate::provider::ProviderKind;

/// Errors that can occur while configuring or sending email.
#[derive(Debug, Error)]
pub enum MailerError {
    /// No enabled primary provider is configured for the tenant.
    #[error("No primary email provider configured")]
    NoPrimaryProvider,

    /// The provider exists but is disabled.
    #[error("Email provider {0} is disabled")]
    ProviderDisabled(ProviderKind),

    /// A required credential is absent from the provider config.
    #[error("Email provider {provider} is missing {field}")]
    MissingCredential {
        provider: ProviderKind,
        field: &'static str,
    },

    /// A stored secret could not be decrypted.
    #[error("Secret could not be decrypted: {0}")]
    Secret(String),

    /// An address or message could not be built.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The provider answered with a non-success status.
    #[error("{provider} rejected the request with status {status}: {body}")]
    Rejected {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// The HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP delivery failed.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// The cloud email API call failed.
    #[error("SES error: {0}")]
    Ses(String),

    /// Provider configuration could not be loaded.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lettre::transport::smtp::Error> for MailerError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailerError::Smtp(err.to_string())
    }
}

impl From<lettre::error::Error> for MailerError {
    fn from(err: lettre::error::Error) -> Self {
        MailerError::InvalidMessage(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailerError {
    fn from(err: lettre::address::AddressError) -> Self {
        MailerError::InvalidMessage(err.to_string())
    }
}
