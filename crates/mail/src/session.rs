//! IMAP session seam and its `async-imap` implementation.
//!
//! The fetch sequencer only talks to [`MailConnector`] and [`MailSession`],
//! so tests drive it with in-memory sessions.

use std::{sync::Arc, time::Duration};

use {
    async_imap::{Client, Session, types::Fetch},
    async_trait::async_trait,
    futures::TryStreamExt,
    rustls::{ClientConfig, pki_types::ServerName},
    secrecy::ExposeSecret,
    tokio::{net::TcpStream, sync::mpsc, time::timeout},
    tokio_rustls::{TlsConnector, client::TlsStream},
    tokio_util::{
        compat::{Compat, TokioAsyncReadCompatExt},
        sync::CancellationToken,
    },
    tracing::{debug, info},
};

use davgate_config::Credentials;

use crate::{
    encoded_word::decode_header,
    error::{Error, MailStep, Result},
    range::SequenceRange,
    types::{FetchFields, MailMessage},
};

/// iCloud IMAP host (implicit TLS).
pub const IMAP_HOST: &str = "imap.mail.me.com";
pub const IMAP_PORT: u16 = 993;

/// Opens an authenticated session. One session per fetch sequence.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailSession>>;
}

/// An authenticated IMAP session.
#[async_trait]
pub trait MailSession: Send {
    /// Select a mailbox and return its message count.
    async fn select(&mut self, mailbox: &str) -> Result<u32>;

    /// Fetch `range` from the selected mailbox, sending each message to
    /// `sink` in server order. Stops early without error when `cancel`
    /// fires or the receiving side is dropped.
    async fn fetch(
        &mut self,
        mailbox: &str,
        range: SequenceRange,
        fields: FetchFields,
        sink: mpsc::Sender<MailMessage>,
        cancel: CancellationToken,
    ) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}

type ImapStream = Compat<TlsStream<TcpStream>>;

/// TCP + TLS + LOGIN against the iCloud IMAP server.
pub struct ImapConnector {
    tls: Arc<ClientConfig>,
    timeout: Duration,
}

impl ImapConnector {
    #[must_use]
    pub fn new(tls: Arc<ClientConfig>, timeout: Duration) -> Self {
        Self { tls, timeout }
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailSession>> {
        let server = format!("{IMAP_HOST}:{IMAP_PORT}");
        let secs = self.timeout.as_secs();
        let timed_out = |step| Error::Timeout { step, secs };

        let tcp = timeout(self.timeout, TcpStream::connect((IMAP_HOST, IMAP_PORT)))
            .await
            .map_err(|_| timed_out(MailStep::Connect))?
            .map_err(|e| Error::connect(&server, e))?;
        let server_name =
            ServerName::try_from(IMAP_HOST.to_string()).map_err(|e| Error::connect(&server, e))?;
        let connector = TlsConnector::from(self.tls.clone());
        let stream = timeout(self.timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| timed_out(MailStep::Connect))?
            .map_err(|e| Error::connect(&server, e))?;
        debug!(server = %server, "TLS handshake complete");

        let client = Client::new(stream.compat());
        let login = client.login(&credentials.username, credentials.password.expose_secret());
        let session = match timeout(self.timeout, login).await {
            Ok(Ok(session)) => session,
            Ok(Err((e, _client))) => return Err(Error::authenticate(e)),
            Err(_) => return Err(timed_out(MailStep::Authenticate)),
        };
        info!(server = %server, "IMAP session authenticated");

        Ok(Box::new(ImapSession {
            session,
            timeout: self.timeout,
        }))
    }
}

struct ImapSession {
    session: Session<ImapStream>,
    timeout: Duration,
}

impl ImapSession {
    fn timed_out(&self, step: MailStep) -> Error {
        Error::Timeout {
            step,
            secs: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn select(&mut self, mailbox: &str) -> Result<u32> {
        let selected = match timeout(self.timeout, self.session.select(mailbox)).await {
            Ok(result) => result.map_err(|e| Error::select(mailbox, e))?,
            Err(_) => return Err(self.timed_out(MailStep::Select)),
        };
        debug!(mailbox, exists = selected.exists, "mailbox selected");
        Ok(selected.exists)
    }

    async fn fetch(
        &mut self,
        mailbox: &str,
        range: SequenceRange,
        fields: FetchFields,
        sink: mpsc::Sender<MailMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let limit = self.timeout;
        let secs = limit.as_secs();
        let timed_out = || Error::Timeout {
            step: MailStep::Fetch,
            secs,
        };

        let stream = timeout(limit, self.session.fetch(range.to_string(), fields.query()))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| Error::fetch(mailbox, e))?;
        tokio::pin!(stream);

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(mailbox, "fetch cancelled");
                    return Ok(());
                },
                next = timeout(limit, stream.try_next()) => next,
            };
            let Some(fetch) = next
                .map_err(|_| timed_out())?
                .map_err(|e| Error::fetch(mailbox, e))?
            else {
                break;
            };

            let message = to_message(&fetch, fields);
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                sent = sink.send(message) => {
                    if sent.is_err() {
                        debug!(mailbox, "consumer dropped, stopping fetch");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        match timeout(self.timeout, self.session.logout()).await {
            Ok(result) => result.map_err(Error::logout),
            Err(_) => Err(self.timed_out(MailStep::Logout)),
        }
    }
}

fn to_message(fetch: &Fetch, fields: FetchFields) -> MailMessage {
    let envelope = fetch.envelope();
    let from = envelope
        .and_then(|e| e.from.as_ref())
        .map(|senders| {
            senders
                .iter()
                .filter_map(|a| {
                    format_address(a.name.as_deref(), a.mailbox.as_deref(), a.host.as_deref())
                })
                .collect()
        })
        .unwrap_or_default();
    let body = if fields.includes_body() {
        fetch
            .text()
            .map(|text| String::from_utf8_lossy(text).trim().to_string())
    } else {
        None
    };

    MailMessage {
        sequence: fetch.message,
        subject: envelope
            .and_then(|e| e.subject.as_deref())
            .map(decode_header),
        from,
        date: envelope
            .and_then(|e| e.date.as_deref())
            .map(|d| String::from_utf8_lossy(d).trim().to_string()),
        body,
    }
}

/// Render an envelope address as `Name <mailbox@host>`, or bare
/// `mailbox@host` when there is no display name.
pub(crate) fn format_address(
    name: Option<&[u8]>,
    mailbox: Option<&[u8]>,
    host: Option<&[u8]>,
) -> Option<String> {
    let address = match (mailbox, host) {
        (Some(mailbox), Some(host)) => format!(
            "{}@{}",
            String::from_utf8_lossy(mailbox),
            String::from_utf8_lossy(host)
        ),
        (Some(mailbox), None) => String::from_utf8_lossy(mailbox).into_owned(),
        (None, _) => String::new(),
    };
    let name = name
        .map(decode_header)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    match (name, address.is_empty()) {
        (Some(name), false) => Some(format!("{name} <{address}>")),
        (Some(name), true) => Some(name),
        (None, false) => Some(address),
        (None, true) => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_with_display_name() {
        assert_eq!(
            format_address(Some(b"Jane Doe"), Some(b"jane"), Some(b"example.com")).as_deref(),
            Some("Jane Doe <jane@example.com>")
        );
    }

    #[test]
    fn address_without_display_name() {
        assert_eq!(
            format_address(None, Some(b"jane"), Some(b"example.com")).as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(
            format_address(Some(b"  "), Some(b"jane"), Some(b"example.com")).as_deref(),
            Some("jane@example.com")
        );
    }

    #[test]
    fn encoded_display_name_is_decoded() {
        assert_eq!(
            format_address(
                Some(b"=?utf-8?Q?Ren=C3=A9?="),
                Some(b"rene"),
                Some(b"example.fr")
            )
            .as_deref(),
            Some("René <rene@example.fr>")
        );
    }

    #[test]
    fn empty_address_is_none() {
        assert_eq!(format_address(None, None, None), None);
    }

    #[test]
    fn fetch_queries_peek_at_body() {
        assert_eq!(FetchFields::Envelope.query(), "ENVELOPE");
        assert!(FetchFields::EnvelopeAndBody.query().contains("BODY.PEEK[TEXT]"));
    }
}
