use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};

use super::{SendReceipt, smtp};
use crate::error::MailerError;
use crate::provider::ResolvedProvider;
use crate::template::RenderedEmail;

/// Builds a client from tenant-supplied IAM credentials.
pub(super) fn client(region: &str, access_key_id: &str, secret_access_key: &str) -> Client {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "tenant-email-provider",
    );
    let config = aws_sdk_sesv2::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials)
        .build();
    Client::from_conf(config)
}

pub(super) async fn send(
    client: &Client,
    configuration_set: Option<&str>,
    provider: &ResolvedProvider,
    email: &RenderedEmail,
) -> Result<SendReceipt, MailerError> {
    let mime = smtp::build_message(provider, email)?.formatted();
    let raw = RawMessage::builder()
        .data(Blob::new(mime))
        .build()
        .map_err(|e| MailerError::InvalidMessage(e.to_string()))?;

    let mut request = client
        .send_email()
        .from_email_address(provider.from_email.clone())
        .destination(Destination::builder().to_addresses(email.to.clone()).build())
        .content(EmailContent::builder().raw(raw).build());
    if let Some(set) = configuration_set {
        request = request.configuration_set_name(set);
    }

    let output = request
        .send()
        .await
        .map_err(|e| MailerError::Ses(e.to_string()))?;

    Ok(SendReceipt {
        message_id: output.message_id().map(str::to_string),
    })
}

pub(super) async fn test(client: &Client) -> Result<(), MailerError> {
    client
        .get_account()
        .send()
        .await
        .map_err(|e| MailerError::Ses(e.to_string()))?;
    Ok(())
}
