//! Shared dependencies handed to every tool.

use std::sync::Arc;

use {
    davgate_caldav::{HyperTransportFactory, SchedulingClient, TransportFactory},
    davgate_config::{Credentials, GatewayConfig},
    davgate_mail::{ImapConnector, MailConnector, MailSender, MailboxFetcher, SmtpSender},
};

use crate::error::Result;

/// Configuration plus the protocol seams. Cloning is cheap; every field is
/// shared. Each tool call builds its own client from these, so no protocol
/// state outlives a call.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<GatewayConfig>,
    pub dav: Arc<dyn TransportFactory>,
    pub imap: Arc<dyn MailConnector>,
    pub smtp: Arc<dyn MailSender>,
}

impl ToolContext {
    #[must_use]
    pub fn new(
        config: Arc<GatewayConfig>,
        dav: Arc<dyn TransportFactory>,
        imap: Arc<dyn MailConnector>,
        smtp: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            config,
            dav,
            imap,
            smtp,
        }
    }

    /// Real network seams: hyper for WebDAV, async-imap and lettre for mail,
    /// all sharing one rustls config and the configured timeout.
    pub fn connect(config: Arc<GatewayConfig>) -> Result<Self> {
        let tls = davgate_common::tls::client_config()?;
        let timeout = config.timeout();
        Ok(Self::new(
            config,
            Arc::new(HyperTransportFactory::new(tls.clone(), timeout)),
            Arc::new(ImapConnector::new(tls, timeout)),
            Arc::new(SmtpSender::new(timeout)),
        ))
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Ok(self.config.credentials()?)
    }

    pub fn scheduling_client(&self) -> Result<SchedulingClient> {
        Ok(SchedulingClient::new(self.dav.clone(), self.credentials()?))
    }

    pub fn mailbox_fetcher(&self) -> Result<MailboxFetcher> {
        Ok(MailboxFetcher::new(self.imap.clone(), self.credentials()?))
    }
}
