//! Mailbox fetch sequencer.
//!
//! `connect → authenticate → select → compute range → fetch → logout`. The
//! fetch runs as its own task that streams records through a bounded channel
//! while the caller drains it. The caller always drains to completion before
//! joining the producer, and a drop guard cancels the producer if the caller
//! is itself abandoned mid-drain.

use std::sync::Arc;

use {
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use davgate_config::Credentials;

use crate::{
    error::{Error, Result},
    range::SequenceRange,
    session::{MailConnector, MailSession},
    types::{FetchOutcome, FetchRequest, MailMessage},
};

/// Capacity of the producer/consumer channel.
pub const CHANNEL_CAPACITY: usize = 10;

/// Runs fetch sequences over sessions opened by a [`MailConnector`].
pub struct MailboxFetcher {
    connector: Arc<dyn MailConnector>,
    credentials: Credentials,
}

impl MailboxFetcher {
    #[must_use]
    pub fn new(connector: Arc<dyn MailConnector>, credentials: Credentials) -> Self {
        Self {
            connector,
            credentials,
        }
    }

    /// Fetch the most recent `request.limit` messages of `request.mailbox`.
    ///
    /// An empty mailbox is a successful outcome with no messages. The session
    /// is logged out on every path once it has been opened.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let mut session = self.connector.connect(&self.credentials).await?;

        let total = match session.select(&request.mailbox).await {
            Ok(total) => total,
            Err(e) => {
                close(session).await;
                return Err(e);
            },
        };

        let Some(range) = SequenceRange::most_recent(total, request.limit) else {
            debug!(mailbox = %request.mailbox, total, "nothing to fetch");
            close(session).await;
            return Ok(FetchOutcome {
                mailbox: request.mailbox.clone(),
                total,
                messages: Vec::new(),
            });
        };
        debug!(mailbox = %request.mailbox, total, range = %range, "fetching");

        let (messages, session, produced) = stream_range(session, request, range).await;
        if let Some(session) = session {
            close(session).await;
        }
        produced?;

        info!(
            mailbox = %request.mailbox,
            total,
            fetched = messages.len(),
            "mailbox fetch complete"
        );
        Ok(FetchOutcome {
            mailbox: request.mailbox.clone(),
            total,
            messages,
        })
    }
}

/// Spawn the producer, drain the channel until it closes, then join.
///
/// Returns the session back unless the producer task panicked.
async fn stream_range(
    mut session: Box<dyn MailSession>,
    request: &FetchRequest,
    range: SequenceRange,
) -> (Vec<MailMessage>, Option<Box<dyn MailSession>>, Result<()>) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let _abandon = cancel.clone().drop_guard();

    let mailbox = request.mailbox.clone();
    let fields = request.fields;
    let producer = tokio::spawn(async move {
        let result = session.fetch(&mailbox, range, fields, tx, cancel).await;
        (session, result)
    });

    let mut messages = Vec::with_capacity(range.len());
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }

    match producer.await {
        Ok((session, result)) => (messages, Some(session), result),
        Err(e) => {
            let err = Error::fetch(request.mailbox.as_str(), e);
            (messages, None, Err(err))
        },
    }
}

async fn close(mut session: Box<dyn MailSession>) {
    if let Err(e) = session.logout().await {
        warn!(error = %e, "IMAP logout failed");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::MailStep, types::FetchFields},
        async_trait::async_trait,
        davgate_common::ErrorKind,
        std::{
            io,
            sync::{
                Mutex,
                atomic::{AtomicBool, AtomicUsize, Ordering},
            },
            time::Duration,
        },
    };

    /// Shared probe the test inspects after the sequence finishes.
    #[derive(Default)]
    struct Probe {
        logouts: AtomicUsize,
        cancelled: AtomicBool,
        ranges: Mutex<Vec<String>>,
        queries: Mutex<Vec<&'static str>>,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        None,
        Login,
        Select,
        FetchMidway,
        Hang,
        Logout,
    }

    struct FakeMailbox {
        probe: Arc<Probe>,
        total: u32,
        fault: Fault,
    }

    #[async_trait]
    impl MailConnector for FakeMailbox {
        async fn connect(&self, _credentials: &Credentials) -> Result<Box<dyn MailSession>> {
            if self.fault == Fault::Login {
                return Err(Error::authenticate(io::Error::other("NO [AUTHENTICATIONFAILED]")));
            }
            Ok(Box::new(FakeSession {
                probe: self.probe.clone(),
                total: self.total,
                fault: self.fault,
            }))
        }
    }

    struct FakeSession {
        probe: Arc<Probe>,
        total: u32,
        fault: Fault,
    }

    #[async_trait]
    impl MailSession for FakeSession {
        async fn select(&mut self, mailbox: &str) -> Result<u32> {
            if self.fault == Fault::Select {
                return Err(Error::select(mailbox, io::Error::other("NO Mailbox does not exist")));
            }
            Ok(self.total)
        }

        async fn fetch(
            &mut self,
            mailbox: &str,
            range: SequenceRange,
            fields: FetchFields,
            sink: mpsc::Sender<MailMessage>,
            cancel: CancellationToken,
        ) -> Result<()> {
            self.probe.ranges.lock().unwrap().push(range.to_string());
            self.probe.queries.lock().unwrap().push(fields.query());
            if self.fault == Fault::Hang {
                cancel.cancelled().await;
                self.probe.cancelled.store(true, Ordering::SeqCst);
                return Ok(());
            }
            for seq in range.lower()..=range.upper() {
                if self.fault == Fault::FetchMidway && seq == range.lower() + 2 {
                    return Err(Error::fetch(mailbox, io::Error::other("connection reset")));
                }
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let message = MailMessage {
                    sequence: seq,
                    subject: Some(format!("Message {seq}")),
                    from: vec!["a@example.com".into()],
                    date: None,
                    body: fields.includes_body().then(|| format!("body {seq}")),
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            Ok(())
        }

        async fn logout(&mut self) -> Result<()> {
            self.probe.logouts.fetch_add(1, Ordering::SeqCst);
            if self.fault == Fault::Logout {
                return Err(Error::logout(io::Error::other("BYE")));
            }
            Ok(())
        }
    }

    fn fetcher(total: u32, fault: Fault) -> (MailboxFetcher, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let connector = FakeMailbox {
            probe: probe.clone(),
            total,
            fault,
        };
        let fetcher = MailboxFetcher::new(Arc::new(connector), Credentials::new("me", "pw"));
        (fetcher, probe)
    }

    fn inbox(limit: u32) -> FetchRequest {
        FetchRequest::new("INBOX", limit, FetchFields::Envelope)
    }

    #[tokio::test]
    async fn small_mailbox_returns_all_in_ascending_order() {
        let (fetcher, probe) = fetcher(3, Fault::None);
        let outcome = fetcher.fetch(&inbox(10)).await.unwrap();

        let seqs: Vec<u32> = outcome.messages.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, [1, 2, 3]);
        assert_eq!(outcome.total, 3);
        assert_eq!(probe.ranges.lock().unwrap().as_slice(), ["1:3"]);
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn more_messages_than_channel_capacity_are_all_drained() {
        let (fetcher, probe) = fetcher(500, Fault::None);
        let outcome = fetcher.fetch(&inbox(50)).await.unwrap();

        assert_eq!(outcome.messages.len(), 50);
        assert_eq!(outcome.messages[0].sequence, 451);
        assert_eq!(outcome.messages[49].sequence, 500);
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_mailbox_is_not_an_error() {
        let (fetcher, probe) = fetcher(0, Fault::None);
        let outcome = fetcher.fetch(&inbox(10)).await.unwrap();

        assert!(outcome.messages.is_empty());
        assert!(probe.ranges.lock().unwrap().is_empty());
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn body_fetch_uses_peek_query() {
        let (fetcher, probe) = fetcher(2, Fault::None);
        let request = FetchRequest::new("Notes", 10, FetchFields::EnvelopeAndBody);
        let outcome = fetcher.fetch(&request).await.unwrap();

        assert_eq!(outcome.messages[1].body.as_deref(), Some("body 2"));
        assert_eq!(
            probe.queries.lock().unwrap().as_slice(),
            ["(ENVELOPE BODY.PEEK[TEXT])"]
        );
    }

    #[tokio::test]
    async fn login_failure_is_tagged_and_skips_logout() {
        let (fetcher, probe) = fetcher(3, Fault::Login);
        let err = fetcher.fetch(&inbox(10)).await.unwrap_err();

        assert_eq!(err.step(), Some(MailStep::Authenticate));
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_folder_is_protocol_error_with_hint() {
        let (fetcher, probe) = fetcher(3, Fault::Select);
        let request = FetchRequest::new("Notes", 10, FetchFields::EnvelopeAndBody);
        let err = fetcher.fetch(&request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        let text = err.to_string();
        assert!(text.contains("'Notes'"));
        assert!(text.contains("might not exist"));
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_after_partial_delivery_still_logs_out() {
        let (fetcher, probe) = fetcher(20, Fault::FetchMidway);
        let err = fetcher.fetch(&inbox(10)).await.unwrap_err();

        assert_eq!(err.step(), Some(MailStep::Fetch));
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logout_failure_does_not_change_outcome() {
        let (fetcher, probe) = fetcher(2, Fault::Logout);
        let outcome = fetcher.fetch(&inbox(10)).await.unwrap();

        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(probe.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoning_the_caller_cancels_the_producer() {
        let (fetcher, probe) = fetcher(5, Fault::Hang);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), fetcher.fetch(&inbox(10))).await;
        assert!(abandoned.is_err());

        for _ in 0..100 {
            if probe.cancelled.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("producer was not cancelled");
    }
}
