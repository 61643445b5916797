use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use once_cell::sync::OnceCell;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

/// Upper bound for provider response bodies.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

static TLS_CONFIG: OnceCell<ClientConfig> = OnceCell::new();

/// Shared TLS configuration (ring provider, webpki roots), built once.
pub fn shared_tls_config() -> Result<ClientConfig, rustls::Error> {
    TLS_CONFIG
        .get_or_try_init(|| {
            let mut root_cert_store = RootCertStore::empty();
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let config = ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();
            Ok(config)
        })
        .cloned()
}

/// Client speaking HTTPS to real providers and plain HTTP to local test doubles.
pub fn build_client() -> Result<HttpClient, rustls::Error> {
    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(shared_tls_config()?)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();
    Ok(Client::builder(TokioExecutor::new()).build(connector))
}

/// Collect a response body, refusing anything larger than [`MAX_BODY_BYTES`].
pub async fn read_body(body: Incoming) -> Result<Bytes, String> {
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| e.to_string())
}
