use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{SendReceipt, from_header};
use crate::error::MailerError;
use crate::provider::ResolvedProvider;
use crate::template::RenderedEmail;

fn transport(
    host: &str,
    port: u16,
    login: Option<&(String, String)>,
    secure: bool,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailerError> {
    let builder = if secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
    };

    let builder = builder.port(port);
    let builder = match login {
        Some((user, password)) => builder.credentials(Credentials::new(user.clone(), password.clone())),
        None => builder,
    };

    Ok(builder.build())
}

/// Builds the MIME message for a rendered email.
pub(super) fn build_message(
    provider: &ResolvedProvider,
    email: &RenderedEmail,
) -> Result<Message, MailerError> {
    let from: Mailbox = from_header(provider).parse()?;
    let to: Mailbox = email.to.parse()?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())?)
}

pub(super) async fn send(
    host: &str,
    port: u16,
    login: Option<&(String, String)>,
    secure: bool,
    provider: &ResolvedProvider,
    email: &RenderedEmail,
) -> Result<SendReceipt, MailerError> {
    let message = build_message(provider, email)?;
    let response = transport(host, port, login, secure)?.send(message).await?;

    Ok(SendReceipt {
        message_id: response.first_line().map(str::to_string),
    })
}

pub(super) async fn test(
    host: &str,
    port: u16,
    login: Option<&(String, String)>,
    secure: bool,
) -> Result<(), MailerError> {
    if transport(host, port, login, secure)?.test_connection().await? {
        Ok(())
    } else {
        Err(MailerError::Smtp(format!("{host}:{port} refused the connection")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResolvedCredentials;
    use common::DocumentId;

    fn provider() -> ResolvedProvider {
        ResolvedProvider {
            id: DocumentId::new(),
            from_email: "shop@example.com".into(),
            from_name: Some("Shop".into()),
            credentials: ResolvedCredentials::Smtp {
                host: "localhost".into(),
                port: 25,
                login: None,
                secure: false,
            },
        }
    }

    #[test]
    fn builds_html_message() {
        let email = RenderedEmail {
            to: "ann@example.com".into(),
            subject: "Hello".into(),
            html: "<p>hi</p>".into(),
        };
        let formatted = String::from_utf8(build_message(&provider(), &email).unwrap().formatted()).unwrap();
        assert!(formatted.contains("From: Shop <shop@example.com>"));
        assert!(formatted.contains("To: ann@example.com"));
        assert!(formatted.contains("Content-Type: text/html"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let email = RenderedEmail {
            to: "not an address".into(),
            subject: "x".into(),
            html: "x".into(),
        };
        assert!(matches!(
            build_message(&provider(), &email),
            Err(MailerError::InvalidMessage(_))
        ));
    }
}
