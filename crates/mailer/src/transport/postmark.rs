use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{SendReceipt, from_header, snippet};
use crate::error::MailerError;
use crate::provider::{ProviderKind, ResolvedProvider};
use crate::template::RenderedEmail;

const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

#[derive(Debug, Deserialize)]
struct PostmarkResponse {
    #[serde(rename = "MessageID", default)]
    message_id: Option<String>,
    #[serde(rename = "ErrorCode", default)]
    error_code: i64,
    #[serde(rename = "Message", default)]
    message: String,
}

pub(super) async fn send(
    client: &Client,
    base_url: &str,
    server_token: &str,
    message_stream: &str,
    provider: &ResolvedProvider,
    email: &RenderedEmail,
) -> Result<SendReceipt, MailerError> {
    let body = json!({
        "From": from_header(provider),
        "To": email.to,
        "Subject": email.subject,
        "HtmlBody": email.html,
        "MessageStream": message_stream,
    });

    let response = client
        .post(format!("{base_url}/email"))
        .header(TOKEN_HEADER, server_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(MailerError::Rejected {
            provider: ProviderKind::Postmark,
            status: status.as_u16(),
            body: snippet(&text),
        });
    }

    let parsed: PostmarkResponse = response.json().await?;
    if parsed.error_code != 0 {
        return Err(MailerError::Rejected {
            provider: ProviderKind::Postmark,
            status: status.as_u16(),
            body: format!("error {}: {}", parsed.error_code, parsed.message),
        });
    }

    Ok(SendReceipt {
        message_id: parsed.message_id,
    })
}

pub(super) async fn test(
    client: &Client,
    base_url: &str,
    server_token: &str,
) -> Result<(), MailerError> {
    let response = client
        .get(format!("{base_url}/server"))
        .header(TOKEN_HEADER, server_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(MailerError::Rejected {
            provider: ProviderKind::Postmark,
            status: status.as_u16(),
            body: snippet(&text),
        })
    }
}
