use davgate_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
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
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

davgate_common::impl_context!();

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_the_source() {
        let read: std::io::Result<()> = Err(std::io::Error::other("broken pipe"));
        let err = read.context("failed to read request").unwrap_err();
        assert_eq!(err.to_string(), "failed to read request: broken pipe");
    }

    #[test]
    fn context_on_missing_option() {
        let err = None::<u8>.context("no id").unwrap_err();
        assert!(matches!(err, Error::Message { message } if message == "no id"));
    }
}
