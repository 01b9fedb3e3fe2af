//! Scheduling client: collection queries and object uploads.

use std::sync::Arc;

use {
    async_trait::async_trait,
    http::{Method, Request, Response, Uri, header::CONTENT_TYPE},
    tracing::{debug, info, warn},
};

use davgate_config::Credentials;

use crate::{
    error::{Error, Result},
    ical::{self, Document},
    multistatus::{ResponseEntry, parse_multistatus},
    query::SchedulingQuery,
    transport::TransportFactory,
    types::{ItemContent, QueryResultItem, StoredObject},
};

/// Trait for scheduling-protocol interactions.
///
/// This allows mocking in tests without a real server.
#[async_trait]
pub trait CalDavClient: Send + Sync {
    /// Run a calendar-query against a collection. Items that fail to decode
    /// are returned as [`ItemContent::Undecodable`] rather than failing the
    /// whole query.
    async fn query_objects(
        &self,
        endpoint: &str,
        query: &SchedulingQuery,
    ) -> Result<Vec<QueryResultItem>>;

    /// Upload a document to `path` inside the collection at `endpoint`.
    async fn store_object(
        &self,
        endpoint: &str,
        path: &str,
        document: &Document,
    ) -> Result<StoredObject>;
}

/// Per-operation client. Each call opens its own transport through the
/// factory; authentication is validated by the server on first use.
pub struct SchedulingClient {
    factory: Arc<dyn TransportFactory>,
    credentials: Credentials,
}

impl SchedulingClient {
    #[must_use]
    pub fn new(factory: Arc<dyn TransportFactory>, credentials: Credentials) -> Self {
        Self {
            factory,
            credentials,
        }
    }
}

#[async_trait]
impl CalDavClient for SchedulingClient {
    async fn query_objects(
        &self,
        endpoint: &str,
        query: &SchedulingQuery,
    ) -> Result<Vec<QueryResultItem>> {
        let uri = parse_endpoint(endpoint)?;
        let request = Request::builder()
            .method(Method::from_bytes(b"REPORT").map_err(|e| Error::message(e.to_string()))?)
            .uri(uri.clone())
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(query.to_xml())
            .map_err(|e| invalid_endpoint(endpoint, e))?;

        let transport = self.factory.connect(&self.credentials)?;
        debug!(endpoint, component = query.component().as_str(), "transport connected");

        let response = transport.send(request).await?;
        check_status(&response)?;

        let collection = uri.path().trim_end_matches('/');
        let mut items: Vec<QueryResultItem> = parse_multistatus(response.body())?
            .into_iter()
            .filter(|entry| entry.href.trim_end_matches('/') != collection)
            .map(decode_entry)
            .collect();
        items.sort_by(|a, b| a.href.cmp(&b.href));

        let undecodable = items
            .iter()
            .filter(|i| matches!(i.content, ItemContent::Undecodable { .. }))
            .count();
        info!(
            endpoint,
            component = query.component().as_str(),
            items = items.len(),
            undecodable,
            "calendar query complete"
        );
        Ok(items)
    }

    async fn store_object(
        &self,
        endpoint: &str,
        path: &str,
        document: &Document,
    ) -> Result<StoredObject> {
        let path = path.trim_start_matches('/');
        if path.is_empty() || path.split('/').any(|seg| seg == "..") {
            return Err(Error::message(format!("invalid object path '{path}'")));
        }
        let url = format!("{}/{path}", endpoint.trim_end_matches('/'));
        let uri = parse_endpoint(&url)?;
        let body = ical::encode(document)?;

        let transport = self.factory.connect(&self.credentials)?;
        let etag = transport.create(&uri, body).await?;
        info!(url = %url, etag = etag.as_deref().unwrap_or("-"), "calendar object stored");
        Ok(StoredObject { url, etag })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Uri> {
    let uri: Uri = endpoint
        .trim()
        .parse()
        .map_err(|e| invalid_endpoint(endpoint, e))?;
    match (uri.scheme_str(), uri.authority()) {
        (Some("http" | "https"), Some(_)) => Ok(uri),
        _ => Err(Error::InvalidEndpoint {
            url: endpoint.to_string(),
            message: "expected an absolute http(s) URL".to_string(),
        }),
    }
}

fn invalid_endpoint(url: &str, err: impl std::fmt::Display) -> Error {
    Error::InvalidEndpoint {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn check_status(response: &Response<String>) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::from_status(response.status(), response.body()))
    }
}

fn decode_entry(entry: ResponseEntry) -> QueryResultItem {
    let content = match entry.calendar_data.as_deref().map(str::trim) {
        Some(data) if !data.is_empty() => match ical::decode(data) {
            Ok(doc) => ItemContent::Decoded(doc),
            Err(e) => {
                warn!(href = %entry.href, error = %e, "undecodable calendar object");
                ItemContent::Undecodable {
                    reason: e.to_string(),
                }
            },
        },
        _ => {
            if let Some(status) = &entry.status {
                debug!(href = %entry.href, status = %status, "resource listed without data");
            }
            ItemContent::Missing
        },
    };
    QueryResultItem {
        href: entry.href,
        etag: entry.etag,
        content,
    }
}
