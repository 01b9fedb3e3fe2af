//! Authenticated HTTP transport for the scheduling protocol.
//!
//! Every request goes through `tower_http`'s `AddAuthorization` layer, so
//! callers never handle credentials. Calendar-query REPORTs are sent as raw
//! requests; object creation goes through `libdav`. No retries and no cached
//! auth state.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    http::{Request, Response, StatusCode, Uri},
    http_body_util::BodyExt,
    hyper::body::Incoming,
    hyper_rustls::HttpsConnector,
    hyper_util::{
        client::legacy::{Client, connect::HttpConnector},
        rt::TokioExecutor,
    },
    libdav::dav::{PutResource, WebDavClient},
    rustls::ClientConfig,
    secrecy::ExposeSecret,
    tower::ServiceExt,
    tower_http::auth::AddAuthorization,
    tracing::debug,
};

use davgate_config::Credentials;

use crate::error::{Error, Result};

/// Media type of uploaded objects.
const CALENDAR_MEDIA_TYPE: &str = "text/calendar";

/// Sends requests on behalf of one adapter operation.
#[async_trait]
pub trait DavTransport: Send + Sync {
    /// Send one request and return the fully collected response.
    async fn send(&self, request: Request<String>) -> Result<Response<String>>;

    /// Create the calendar object at `url`. The server refuses when one
    /// already exists. Returns the ETag it assigned, if it sent one.
    async fn create(&self, url: &Uri, body: String) -> Result<Option<String>>;
}

/// Opens an authenticated transport. Called once per adapter operation, so a
/// pooling implementation can be swapped in without touching the adapter.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn DavTransport>>;
}

type HyperHttpsClient = Client<HttpsConnector<HttpConnector>, String>;

/// hyper + rustls transport with HTTP Basic authentication.
pub struct HyperTransport {
    inner: AddAuthorization<HyperHttpsClient>,
    timeout: Duration,
}

impl HyperTransport {
    #[must_use]
    pub fn new(credentials: &Credentials, timeout: Duration, tls: &ClientConfig) -> Self {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls.clone())
            .https_or_http()
            .enable_http1()
            .build();
        let client: HyperHttpsClient = Client::builder(TokioExecutor::new()).build(https);
        let inner = AddAuthorization::basic(
            client,
            &credentials.username,
            credentials.password.expose_secret(),
        );
        Self { inner, timeout }
    }

    async fn within_timeout<T>(&self, url: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl DavTransport for HyperTransport {
    async fn send(&self, request: Request<String>) -> Result<Response<String>> {
        let method = request.method().clone();
        let url = request.uri().to_string();
        debug!(%method, %url, "sending request");

        let exchange = async {
            let response = self
                .inner
                .clone()
                .oneshot(request)
                .await
                .map_err(|e| Error::transport(format!("{method} {url} failed"), e))?;
            let (parts, body) = response.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| Error::transport(format!("reading response from {url} failed"), e))?
                .to_bytes();
            let body = String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::MalformedResponse(format!("response body is not UTF-8: {e}"))
            })?;
            debug!(%method, %url, status = parts.status.as_u16(), "response received");
            Ok::<_, Error>(Response::from_parts(parts, body))
        };
        self.within_timeout(&url, exchange).await
    }

    async fn create(&self, url: &Uri, body: String) -> Result<Option<String>> {
        let target = url.to_string();
        debug!(url = %target, "creating resource");

        // Status of the last response, used to classify a libdav failure.
        let status: Arc<Mutex<Option<StatusCode>>> = Arc::default();
        let seen = Arc::clone(&status);
        let client = self
            .inner
            .clone()
            .map_response(move |response: Response<Incoming>| {
                if let Ok(mut slot) = seen.lock() {
                    *slot = Some(response.status());
                }
                response
            });
        let webdav = WebDavClient::new(url.clone(), client);

        let put = async {
            let request = PutResource::new(url.path()).create(body, CALENDAR_MEDIA_TYPE);
            match webdav.request(request).await {
                Ok(response) => Ok(response.etag),
                Err(e) => {
                    let status = status.lock().ok().and_then(|slot| *slot);
                    match status {
                        Some(status) if !status.is_success() => {
                            Err(Error::from_status(status, &e.to_string()))
                        },
                        _ => Err(Error::transport(format!("PUT {target} failed"), e)),
                    }
                },
            }
        };
        let etag = self.within_timeout(&target, put).await?;
        debug!(url = %target, etag = etag.as_deref().unwrap_or("-"), "resource created");
        Ok(etag)
    }
}

/// Builds a fresh [`HyperTransport`] per operation from a shared TLS config.
pub struct HyperTransportFactory {
    tls: Arc<ClientConfig>,
    timeout: Duration,
}

impl HyperTransportFactory {
    #[must_use]
    pub fn new(tls: Arc<ClientConfig>, timeout: Duration) -> Self {
        Self { tls, timeout }
    }
}

impl TransportFactory for HyperTransportFactory {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn DavTransport>> {
        Ok(Arc::new(HyperTransport::new(
            credentials,
            self.timeout,
            &self.tls,
        )))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rustls::RootCertStore,
        tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpListener,
        },
    };

    fn empty_tls() -> ClientConfig {
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth()
    }

    async fn read_head(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn attaches_basic_auth_and_collects_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            let body = "<multistatus xmlns=\"DAV:\"/>";
            let reply = format!(
                "HTTP/1.1 207 Multi-Status\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            head
        });

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_secs(5), &empty_tls());
        let request = Request::builder()
            .method("REPORT")
            .uri(format!("http://{addr}/cal/"))
            .body(String::from("<q/>"))
            .unwrap();
        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status().as_u16(), 207);
        assert_eq!(response.body(), "<multistatus xmlns=\"DAV:\"/>");
        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("report /cal/ http/1.1"));
        assert!(head.contains("authorization: basic bwu6chc="));
    }

    #[tokio::test]
    async fn silent_server_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_millis(200), &empty_tls());
        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(String::new())
            .unwrap();
        let err = transport.send(request).await.unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.kind(), davgate_common::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_secs(5), &empty_tls());
        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(String::new())
            .unwrap();
        let err = transport.send(request).await.unwrap_err();

        assert_eq!(err.kind(), davgate_common::ErrorKind::Transport);
    }

    /// Accept one connection, answer with `reply`, and hand back the request
    /// head.
    async fn serve_once(reply: &'static str) -> (std::net::SocketAddr, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            stream.write_all(reply.as_bytes()).await.unwrap();
            head
        });
        (addr, server)
    }

    #[tokio::test]
    async fn create_puts_with_if_none_match_and_returns_etag() {
        let (addr, server) = serve_once(
            "HTTP/1.1 201 Created\r\netag: \"e9\"\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_secs(5), &empty_tls());
        let url: Uri = format!("http://{addr}/cal/u-1.ics").parse().unwrap();
        let etag = transport
            .create(&url, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".into())
            .await
            .unwrap();

        assert_eq!(etag.as_deref(), Some("\"e9\""));
        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("put /cal/u-1.ics http/1.1"));
        assert!(head.contains("if-none-match: *"));
        assert!(head.contains("content-type: text/calendar"));
        assert!(head.contains("authorization: basic bwu6chc="));
    }

    #[tokio::test]
    async fn create_conflict_is_protocol_error() {
        let (addr, _server) = serve_once(
            "HTTP/1.1 412 Precondition Failed\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_secs(5), &empty_tls());
        let url: Uri = format!("http://{addr}/cal/u-1.ics").parse().unwrap();
        let err = transport.create(&url, String::new()).await.unwrap_err();

        assert!(matches!(err, Error::Status { status: 412, .. }));
        assert_eq!(err.kind(), davgate_common::ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn create_rejected_credentials_are_unauthorized() {
        let (addr, _server) = serve_once(
            "HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let creds = Credentials::new("me", "pw");
        let transport = HyperTransport::new(&creds, Duration::from_secs(5), &empty_tls());
        let url: Uri = format!("http://{addr}/cal/u-1.ics").parse().unwrap();
        let err = transport.create(&url, String::new()).await.unwrap_err();

        assert!(matches!(err, Error::Unauthorized { status: 401 }));
    }
}
