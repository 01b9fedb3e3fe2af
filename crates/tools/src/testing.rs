//! In-memory protocol seams for tool tests.

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    http::{Request, Response, StatusCode, Uri},
    secrecy::Secret,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
};

use {
    davgate_caldav::{DavTransport, TransportFactory},
    davgate_config::{Credentials, GatewayConfig},
    davgate_mail::{
        FetchFields, MailConnector, MailMessage, MailSender, MailSession, OutgoingMail,
        SequenceRange,
    },
};

use crate::context::ToolContext;

pub(crate) const CALENDAR: &str = "https://p01-caldav.icloud.com/123/calendars/home/";
pub(crate) const REMINDERS: &str = "https://p01-caldav.icloud.com/123/calendars/tasks/";

/// Config with credentials and no collections.
pub(crate) fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.account.email = Some("me@icloud.com".into());
    config.account.password = Some(Secret::new("app-pw".into()));
    config
}

/// Config with both dedicated collections set.
pub(crate) fn config_with_collections() -> GatewayConfig {
    let mut config = config();
    config.caldav.calendar_url = Some(CALENDAR.into());
    config.caldav.reminders_url = Some(REMINDERS.into());
    config
}

pub(crate) fn message(sequence: u32, subject: &str) -> MailMessage {
    MailMessage {
        sequence,
        subject: Some(subject.into()),
        from: vec!["Jane <jane@example.com>".into()],
        date: Some("Tue, 2 Jan 2024 09:00:00 +0000".into()),
        body: None,
    }
}

// ── WebDAV ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct DavStub {
    pub requests: Mutex<Vec<Request<String>>>,
    replies: Mutex<VecDeque<(u16, String)>>,
    pub connects: AtomicUsize,
}

impl DavStub {
    pub fn reply(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<(String, String, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.method().to_string(), r.uri().to_string(), r.body().clone()))
            .collect()
    }
}

#[async_trait]
impl DavTransport for DavStub {
    async fn send(&self, request: Request<String>) -> davgate_caldav::Result<Response<String>> {
        self.requests.lock().unwrap().push(request);
        let (status, body) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no reply queued");
        Ok(Response::builder()
            .status(status)
            .header("ETag", "\"e1\"")
            .body(body)
            .unwrap())
    }

    async fn create(&self, url: &Uri, body: String) -> davgate_caldav::Result<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .push(Request::put(url.clone()).body(body).unwrap());
        let (status, body) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no reply queued");
        let status = StatusCode::from_u16(status).unwrap();
        if status.is_success() {
            Ok(Some("\"e1\"".into()))
        } else {
            Err(davgate_caldav::Error::from_status(status, &body))
        }
    }
}

struct DavFactory(Arc<DavStub>);

impl TransportFactory for DavFactory {
    fn connect(&self, _credentials: &Credentials) -> davgate_caldav::Result<Arc<dyn DavTransport>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.clone())
    }
}

// ── IMAP ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct MailboxStub {
    mailboxes: Mutex<HashMap<String, Vec<MailMessage>>>,
    pub queries: Mutex<Vec<(String, FetchFields)>>,
    pub logouts: AtomicUsize,
}

impl MailboxStub {
    pub fn mailbox(&self, name: &str, messages: Vec<MailMessage>) {
        self.mailboxes
            .lock()
            .unwrap()
            .insert(name.to_string(), messages);
    }
}

struct MailboxConnector(Arc<MailboxStub>);

#[async_trait]
impl MailConnector for MailboxConnector {
    async fn connect(&self, _credentials: &Credentials) -> davgate_mail::Result<Box<dyn MailSession>> {
        Ok(Box::new(StubSession(self.0.clone())))
    }
}

struct StubSession(Arc<MailboxStub>);

#[async_trait]
impl MailSession for StubSession {
    async fn select(&mut self, mailbox: &str) -> davgate_mail::Result<u32> {
        match self.0.mailboxes.lock().unwrap().get(mailbox) {
            Some(messages) => Ok(messages.len() as u32),
            None => Err(davgate_mail::Error::select(
                mailbox,
                io::Error::other("NO Mailbox doesn't exist"),
            )),
        }
    }

    async fn fetch(
        &mut self,
        mailbox: &str,
        range: SequenceRange,
        fields: FetchFields,
        sink: mpsc::Sender<MailMessage>,
        _cancel: CancellationToken,
    ) -> davgate_mail::Result<()> {
        self.0
            .queries
            .lock()
            .unwrap()
            .push((mailbox.to_string(), fields));
        let selected: Vec<MailMessage> = self.0.mailboxes.lock().unwrap()[mailbox]
            .iter()
            .filter(|m| (range.lower()..=range.upper()).contains(&m.sequence))
            .cloned()
            .collect();
        for mut message in selected {
            if !fields.includes_body() {
                message.body = None;
            }
            if sink.send(message).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> davgate_mail::Result<()> {
        self.0.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── SMTP ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct SenderStub {
    pub sent: Mutex<Vec<(String, OutgoingMail)>>,
    pub failure: Mutex<Option<String>>,
}

#[async_trait]
impl MailSender for SenderStub {
    async fn send(&self, credentials: &Credentials, mail: &OutgoingMail) -> davgate_mail::Result<()> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(davgate_mail::Error::submit(io::Error::other(reason)));
        }
        davgate_mail::smtp::build_message(&credentials.username, mail)?;
        self.sent
            .lock()
            .unwrap()
            .push((credentials.username.clone(), mail.clone()));
        Ok(())
    }
}

/// A [`ToolContext`] wired to in-memory seams, with handles to inspect them.
pub(crate) struct Harness {
    pub dav: Arc<DavStub>,
    pub mail: Arc<MailboxStub>,
    pub smtp: Arc<SenderStub>,
    pub ctx: ToolContext,
}

impl Harness {
    pub fn new(config: GatewayConfig) -> Self {
        let dav = Arc::new(DavStub::default());
        let mail = Arc::new(MailboxStub::default());
        let smtp = Arc::new(SenderStub::default());
        let ctx = ToolContext::new(
            Arc::new(config),
            Arc::new(DavFactory(dav.clone())),
            Arc::new(MailboxConnector(mail.clone())),
            smtp.clone(),
        );
        Self {
            dav,
            mail,
            smtp,
            ctx,
        }
    }
}
