//! Mail submission over SMTP with STARTTLS.

use std::time::Duration;

use {
    async_trait::async_trait,
    lettre::{
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        address::AddressError,
        message::{Mailbox, header::ContentType},
        transport::smtp::authentication::Credentials as SmtpCredentials,
    },
    secrecy::ExposeSecret,
    tracing::{debug, info},
};

use davgate_config::Credentials;

use crate::{
    error::{Error, Result},
    types::OutgoingMail,
};

/// iCloud submission host. STARTTLS on the submission port.
pub const SMTP_HOST: &str = "smtp.mail.me.com";
pub const SMTP_PORT: u16 = 587;

/// Submits outgoing mail as the account identified by `credentials`.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, credentials: &Credentials, mail: &OutgoingMail) -> Result<()>;
}

/// `lettre` SMTP sender. Opens a fresh transport per message.
pub struct SmtpSender {
    timeout: Duration,
}

impl SmtpSender {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, credentials: &Credentials, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(&credentials.username, mail)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(SMTP_HOST)
            .map_err(Error::submit)?
            .port(SMTP_PORT)
            .credentials(SmtpCredentials::new(
                credentials.username.clone(),
                credentials.password.expose_secret().clone(),
            ))
            .timeout(Some(self.timeout))
            .build();
        debug!(host = SMTP_HOST, port = SMTP_PORT, "submitting message");

        let response = transport.send(message).await.map_err(Error::submit)?;
        info!(to = %mail.to, code = %response.code(), "email submitted");
        Ok(())
    }
}

/// Build a plain-text message from the account address to `mail.to`.
pub fn build_message(from: &str, mail: &OutgoingMail) -> Result<Message> {
    let from: Mailbox = from.trim().parse().map_err(|e: AddressError| {
        davgate_config::Error::invalid("ICLOUD_EMAIL", format!("not a mail address: {e}"))
    })?;
    let to: Mailbox = mail
        .to
        .trim()
        .parse()
        .map_err(|e: AddressError| Error::InvalidAddress {
            address: mail.to.clone(),
            message: e.to_string(),
        })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| Error::Build(e.to_string()))
}
