//! Shared error taxonomy and utilities used across all davgate crates.

pub mod error;
pub mod tls;

pub use error::{Error, ErrorKind, FromMessage, Result};
