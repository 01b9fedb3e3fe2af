//! CalDAV scheduling adapter for iCloud.
//!
//! Provides the iCalendar codec, calendar-query construction, and a client
//! that runs queries and uploads objects over an authenticated transport.

pub mod client;
pub mod error;
pub mod ical;
mod multistatus;
pub mod query;
pub mod transport;
pub mod types;

pub use {
    client::{CalDavClient, SchedulingClient},
    error::{DecodeError, DecodeErrorKind, EncodeError, Error, Result},
    ical::{Component, Document, NewEvent, NewToDo, Property, PropertySet, extract_field},
    query::SchedulingQuery,
    transport::{DavTransport, HyperTransportFactory, TransportFactory},
    types::{ComponentKind, ItemContent, QueryResultItem, StoredObject, TimeRange},
};
