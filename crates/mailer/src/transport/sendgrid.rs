use reqwest::Client;
use serde_json::json;

use super::{SendReceipt, snippet};
use crate::error::MailerError;
use crate::provider::{ProviderKind, ResolvedProvider};
use crate::template::RenderedEmail;

pub(super) async fn send(
    client: &Client,
    base_url: &str,
    api_key: &str,
    categories: &[String],
    provider: &ResolvedProvider,
    email: &RenderedEmail,
) -> Result<SendReceipt, MailerError> {
    let mut from = json!({ "email": provider.from_email });
    if let Some(name) = &provider.from_name {
        from["name"] = json!(name);
    }

    let mut body = json!({
        "personalizations": [{ "to": [{ "email": email.to }] }],
        "from": from,
        "subject": email.subject,
        "content": [{ "type": "text/html", "value": email.html }],
    });
    if !categories.is_empty() {
        body["categories"] = json!(categories);
    }

    let response = client
        .post(format!("{base_url}/v3/mail/send"))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(MailerError::Rejected {
            provider: ProviderKind::Sendgrid,
            status: status.as_u16(),
            body: snippet(&text),
        });
    }

    let message_id = response
        .headers()
        .get("x-message-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(SendReceipt { message_id })
}

pub(super) async fn test(client: &Client, base_url: &str, api_key: &str) -> Result<(), MailerError> {
    let response = client
        .get(format!("{base_url}/v3/scopes"))
        .bearer_auth(api_key)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(MailerError::Rejected {
            provider: ProviderKind::Sendgrid,
            status: status.as_u16(),
            body: snippet(&text),
        })
    }
}
