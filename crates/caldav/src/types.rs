//! Typed structs for scheduling operations.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::ical::Document;

/// The component type a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Event,
    ToDo,
}

impl ComponentKind {
    /// Wire name (`VEVENT` / `VTODO`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::ToDo => "VTODO",
        }
    }

    /// Parse a wire name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("VEVENT") {
            Some(Self::Event)
        } else if name.eq_ignore_ascii_case("VTODO") {
            Some(Self::ToDo)
        } else {
            None
        }
    }
}

/// A closed time interval used as a query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// What came back for one resource in a query response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    /// The calendar data parsed cleanly.
    Decoded(Document),
    /// Calendar data was present but did not parse.
    Undecodable { reason: String },
    /// The server listed the resource without calendar data.
    Missing,
}

/// One resource returned by a collection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResultItem {
    /// Server-assigned path of the resource.
    pub href: String,
    pub etag: Option<String>,
    pub content: ItemContent,
}

impl QueryResultItem {
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        match &self.content {
            ItemContent::Decoded(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Absolute URL the object was written to.
    pub url: String,
    /// Entity tag assigned by the server, if it sent one.
    pub etag: Option<String>,
}
