use davgate_common::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidParams(String),

    #[error(transparent)]
    Config(#[from] davgate_config::Error),

    #[error(transparent)]
    CalDav(#[from] davgate_caldav::Error),

    #[error(transparent)]
    Mail(#[from] davgate_mail::Error),

    #[error(transparent)]
    Setup(#[from] davgate_common::Error),

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
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParams(_) => ErrorKind::Validation,
            Self::Config(e) => e.kind(),
            Self::CalDav(e) => e.kind(),
            Self::Mail(e) => e.kind(),
            Self::Setup(_) => ErrorKind::Configuration,
            Self::Message { .. } => ErrorKind::Protocol,
        }
    }

    /// Text shown to the caller: the kind label, then the error.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {self}", self.kind())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
