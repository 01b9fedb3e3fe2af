use serde::{Deserialize, Serialize};

/// Mailbox the fetch sequencer reads mail from.
pub const INBOX: &str = "INBOX";

/// Mailbox used by legacy (pre-iCloud-sync) Notes.
pub const NOTES_MAILBOX: &str = "Notes";

/// Which message data a fetch retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFields {
    /// Subject, sender and date only.
    Envelope,
    /// Envelope plus the body text. Uses `BODY.PEEK` so `\Seen` is untouched.
    EnvelopeAndBody,
}

impl FetchFields {
    /// IMAP `FETCH` data items.
    #[must_use]
    pub fn query(self) -> &'static str {
        match self {
            Self::Envelope => "ENVELOPE",
            Self::EnvelopeAndBody => "(ENVELOPE BODY.PEEK[TEXT])",
        }
    }

    #[must_use]
    pub fn includes_body(self) -> bool {
        matches!(self, Self::EnvelopeAndBody)
    }
}

/// One fetch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub mailbox: String,
    pub limit: u32,
    pub fields: FetchFields,
}

impl FetchRequest {
    #[must_use]
    pub fn new(mailbox: impl Into<String>, limit: u32, fields: FetchFields) -> Self {
        Self {
            mailbox: mailbox.into(),
            limit,
            fields,
        }
    }
}

/// A fetched message, reduced to display fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Mailbox sequence number.
    pub sequence: u32,
    pub subject: Option<String>,
    /// Envelope senders in order, each `Name <mailbox@host>` or bare
    /// `mailbox@host`. Empty when the envelope names none.
    pub from: Vec<String>,
    pub date: Option<String>,
    pub body: Option<String>,
}

/// Result of a completed fetch sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub mailbox: String,
    /// Messages in the mailbox when it was selected.
    pub total: u32,
    /// Fetched messages in server delivery order.
    pub messages: Vec<MailMessage>,
}

/// A message to submit over SMTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}
