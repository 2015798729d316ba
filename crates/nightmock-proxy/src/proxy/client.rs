//! HTTP client used to forward requests upstream.

use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the HTTP client used by the proxy.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody<Bytes, hyper::Error>>;

/// Create the shared, pooled HTTP/1.1 client for http and https upstreams.
///
/// No connect or request timeout is set: a hung upstream hangs the request.
pub fn create_http_client() -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS
    http_connector.set_nodelay(true);

    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!("No native root certificates ({}), using bundled web PKI roots", e);
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };
    let https_connector = builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(https_connector);

    info!("Upstream client ready (HTTP/1.1, pooled)");
    client
}
