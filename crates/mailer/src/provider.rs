//! Email provider configuration.
//!
//! Provider documents carry a `provider` tag selecting one of a closed set
//! of kinds. Credentials are stored sealed and only opened right before a
//! send via [`ProviderConfig::resolve`].

use common::DocumentId;
use serde::{Deserialize, Serialize};
use store::Document;

use crate::error::MailerError;
use crate::secrets::{SealedSecret, SecretCipher};

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Smtp,
    Sendgrid,
    Postmark,
    Ses,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Smtp => "smtp",
            ProviderKind::Sendgrid => "sendgrid",
            ProviderKind::Postmark => "postmark",
            ProviderKind::Ses => "ses",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a provider in failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Primary,
    Fallback,
    #[default]
    Standby,
}

/// Kind-specific settings, discriminated by the `provider` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderSettings {
    #[serde(rename_all = "camelCase")]
    Smtp {
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<SealedSecret>,
        /// Implicit TLS (port 465) instead of STARTTLS.
        #[serde(default)]
        secure: bool,
    },
    #[serde(rename_all = "camelCase")]
    Sendgrid {
        #[serde(default)]
        api_key: Option<SealedSecret>,
        #[serde(default)]
        categories: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Postmark {
        #[serde(default)]
        server_token: Option<SealedSecret>,
        #[serde(default)]
        message_stream: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Ses {
        region: String,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<SealedSecret>,
        #[serde(default)]
        configuration_set: Option<String>,
    },
}

fn default_smtp_port() -> u16 {
    587
}

impl ProviderSettings {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSettings::Smtp { .. } => ProviderKind::Smtp,
            ProviderSettings::Sendgrid { .. } => ProviderKind::Sendgrid,
            ProviderSettings::Postmark { .. } => ProviderKind::Postmark,
            ProviderSettings::Ses { .. } => ProviderKind::Ses,
        }
    }
}

/// A stored email provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: DocumentId,
    #[serde(flatten)]
    pub settings: ProviderSettings,
    pub from_email: String,
    #[serde(default)]
    pub from_name: Option<String>,
    /// Anything but an explicit `false` counts as enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub role: ProviderRole,
}

impl ProviderConfig {
    pub const ROLE_FIELD: &'static str = "role";

    pub fn new(settings: ProviderSettings, from_email: impl Into<String>, role: ProviderRole) -> Self {
        Self {
            id: DocumentId::new(),
            settings,
            from_email: from_email.into(),
            from_name: None,
            enabled: None,
            role,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.settings.kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// Opens sealed credentials and checks that required ones are present.
    pub fn resolve(&self, cipher: &SecretCipher) -> Result<ResolvedProvider, MailerError> {
        let kind = self.kind();
        let open = |secret: &Option<SealedSecret>, field: &'static str| match secret {
            Some(sealed) => cipher.open(sealed),
            None => Err(MailerError::MissingCredential {
                provider: kind,
                field,
            }),
        };

        let credentials = match &self.settings {
            ProviderSettings::Smtp {
                host,
                port,
                username,
                password,
                secure,
            } => ResolvedCredentials::Smtp {
                host: host.clone(),
                port: *port,
                login: match username {
                    Some(user) => Some((user.clone(), open(password, "password")?)),
                    None => None,
                },
                secure: *secure,
            },
            ProviderSettings::Sendgrid {
                api_key,
                categories,
            } => ResolvedCredentials::Sendgrid {
                api_key: open(api_key, "apiKey")?,
                categories: categories.clone(),
            },
            ProviderSettings::Postmark {
                server_token,
                message_stream,
            } => ResolvedCredentials::Postmark {
                server_token: open(server_token, "serverToken")?,
                message_stream: message_stream
                    .clone()
                    .unwrap_or_else(|| "outbound".to_string()),
            },
            ProviderSettings::Ses {
                region,
                access_key_id,
                secret_access_key,
                configuration_set,
            } => ResolvedCredentials::Ses {
                region: region.clone(),
                access_key_id: access_key_id.clone().ok_or(MailerError::MissingCredential {
                    provider: kind,
                    field: "accessKeyId",
                })?,
                secret_access_key: open(secret_access_key, "secretAccessKey")?,
                configuration_set: configuration_set.clone(),
            },
        };

        Ok(ResolvedProvider {
            id: self.id,
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            credentials,
        })
    }
}

impl Document for ProviderConfig {
    const COLLECTION: &'static str = "email_providers";

    fn id(&self) -> DocumentId {
        self.id
    }
}

/// Plaintext credentials, alive only for the duration of a send.
#[derive(Clone)]
pub enum ResolvedCredentials {
    Smtp {
        host: String,
        port: u16,
        login: Option<(String, String)>,
        secure: bool,
    },
    Sendgrid {
        api_key: String,
        categories: Vec<String>,
    },
    Postmark {
        server_token: String,
        message_stream: String,
    },
    Ses {
        region: String,
        access_key_id: String,
        secret_access_key: String,
        configuration_set: Option<String>,
    },
}

impl ResolvedCredentials {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ResolvedCredentials::Smtp { .. } => ProviderKind::Smtp,
            ResolvedCredentials::Sendgrid { .. } => ProviderKind::Sendgrid,
            ResolvedCredentials::Postmark { .. } => ProviderKind::Postmark,
            ResolvedCredentials::Ses { .. } => ProviderKind::Ses,
        }
    }
}

/// A provider ready to send.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub id: DocumentId,
    pub from_email: String,
    pub from_name: Option<String>,
    pub credentials: ResolvedCredentials,
}

impl ResolvedProvider {
    pub fn kind(&self) -> ProviderKind {
        self.credentials.kind()
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}
