//! iCloud mail adapters.
//!
//! IMAP retrieval runs through [`MailboxFetcher`], which sequences a session
//! from login to logout and streams fetched records through a bounded
//! channel. SMTP submission goes through [`MailSender`].

pub mod encoded_word;
pub mod error;
pub mod fetch;
pub mod range;
pub mod session;
pub mod smtp;
pub mod types;

pub use {
    error::{Error, MailStep, Result},
    fetch::MailboxFetcher,
    range::SequenceRange,
    session::{ImapConnector, MailConnector, MailSession},
    smtp::{MailSender, SmtpSender},
    types::{
        FetchFields, FetchOutcome, FetchRequest, INBOX, MailMessage, NOTES_MAILBOX, OutgoingMail,
    },
};
