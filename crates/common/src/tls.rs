//! Client-side TLS configuration shared by the WebDAV and IMAP transports.

use std::sync::Arc;

use {
    rustls::{ClientConfig, RootCertStore},
    tracing::{debug, warn},
};

use crate::error::Result;

/// Build a rustls client config trusting the platform's native roots.
///
/// The ring provider is selected explicitly so the config does not depend on
/// a process-wide default having been installed.
pub fn client_config() -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()?;
    let (added, ignored) = roots.add_parsable_certificates(certs);
    debug!(added, ignored, "loaded native root certificates");
    if roots.is_empty() {
        warn!("no usable native root certificates, TLS handshakes will fail");
    }

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(Arc::new(config))
}
