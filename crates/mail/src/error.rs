use std::{error::Error as StdError, fmt};

use davgate_common::ErrorKind;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Step of the mailbox fetch sequence a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailStep {
    Connect,
    Authenticate,
    Select,
    Fetch,
    Logout,
}

impl MailStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Authenticate => "authenticate",
            Self::Select => "select",
            Self::Fetch => "fetch",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for MailStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] davgate_config::Error),

    #[error("failed to connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to authenticate: {source}")]
    Authenticate {
        #[source]
        source: BoxError,
    },

    #[error("failed to select mailbox '{mailbox}' (the folder might not exist): {source}")]
    Select {
        mailbox: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch messages from '{mailbox}': {source}")]
    Fetch {
        mailbox: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to log out: {source}")]
    Logout {
        #[source]
        source: BoxError,
    },

    #[error("{step} timed out after {secs}s")]
    Timeout { step: MailStep, secs: u64 },

    #[error("invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP submission failed: {source}")]
    Submit {
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connect<E>(server: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Connect {
            server: server.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn authenticate<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Authenticate {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn select<E>(mailbox: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Select {
            mailbox: mailbox.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn fetch<E>(mailbox: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Fetch {
            mailbox: mailbox.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn logout<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Logout {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn submit<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Submit {
            source: Box::new(source),
        }
    }

    /// The sequence step this error belongs to, if it came from IMAP.
    #[must_use]
    pub fn step(&self) -> Option<MailStep> {
        match self {
            Self::Connect { .. } => Some(MailStep::Connect),
            Self::Authenticate { .. } => Some(MailStep::Authenticate),
            Self::Select { .. } => Some(MailStep::Select),
            Self::Fetch { .. } => Some(MailStep::Fetch),
            Self::Logout { .. } => Some(MailStep::Logout),
            Self::Timeout { step, .. } => Some(*step),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Submit { .. } => {
                ErrorKind::Transport
            },
            Self::InvalidAddress { .. } => ErrorKind::Validation,
            Self::Build(_) => ErrorKind::Encode,
            Self::Authenticate { .. }
            | Self::Select { .. }
            | Self::Fetch { .. }
            | Self::Logout { .. }
            | Self::Message { .. } => ErrorKind::Protocol,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
