use std::error::Error as StdError;

use {
    davgate_common::ErrorKind,
    http::StatusCode,
};

/// Longest server body excerpt carried in a status error.
const BODY_SNIPPET_CHARS: usize = 200;

/// Why an encode was refused.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("calendar document has no components")]
    NoComponents,
    #[error("invalid property or parameter name '{0}'")]
    InvalidName(String),
    #[error("value of {0} contains a line break")]
    InvalidValue(String),
    #[error("parameter {param} on {property} contains a quote, separator or line break")]
    InvalidParam { property: String, param: String },
}

/// Why a decode failed, with the 1-based physical line it failed on.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct DecodeError {
    pub line: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    #[must_use]
    pub fn new(line: usize, kind: DecodeErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("input is empty")]
    Empty,
    #[error("expected BEGIN:VCALENDAR")]
    MissingCalendar,
    #[error("nested VCALENDAR")]
    NestedCalendar,
    #[error("content line has no ':' separator")]
    MissingColon,
    #[error("content line has an empty name")]
    EmptyName,
    #[error("expected END:{expected}, found END:{found}")]
    MismatchedEnd { expected: String, found: String },
    #[error("input ended inside {open}")]
    UnexpectedEof { open: String },
    #[error("content after END:VCALENDAR")]
    TrailingContent,
    #[error("missing required property {0}")]
    MissingProperty(&'static str),
    #[error("calendar parser rejected input: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] davgate_config::Error),
    #[error("invalid endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("server answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed server response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
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
    pub fn transport<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Error for a non-success response. 401 and 403 mean the credentials
    /// were rejected.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Self::Unauthorized {
                status: status.as_u16(),
            };
        }
        Self::Status {
            status: status.as_u16(),
            body: body.trim().chars().take(BODY_SNIPPET_CHARS).collect(),
        }
    }

    /// Taxonomy bucket used when rendering the error at the tool boundary.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidEndpoint { .. } => ErrorKind::Configuration,
            Self::Timeout { .. } | Self::Transport { .. } => ErrorKind::Transport,
            Self::Unauthorized { .. }
            | Self::Status { .. }
            | Self::MalformedResponse(_)
            | Self::Message { .. } => ErrorKind::Protocol,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
