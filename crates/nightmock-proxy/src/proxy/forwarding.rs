//! Request forwarding to the upstream target.

use std::convert::Infallible;
use std::time::Instant;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::http::request;
use hyper::http::uri::{PathAndQuery, Uri};
use hyper::{HeaderMap, Request, StatusCode};
use tracing::debug;

use super::client::HttpClient;
use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Connection refused, DNS failure and other failures to connect
    #[error("{0}")]
    Unreachable(String),

    /// Anything after the connection was made, or a bad upstream request
    #[error("{0}")]
    Failed(String),
}

/// A fully buffered upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream URI for a request: an absolute-form request target is used as
/// is, otherwise the target's scheme and authority are combined with the
/// request path and query. The target's own path is not prepended.
pub fn upstream_uri(target: &Uri, request_uri: &Uri) -> Result<Uri, ForwardError> {
    if request_uri.scheme().is_some() && request_uri.authority().is_some() {
        return Ok(request_uri.clone());
    }
    let path_and_query = request_uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let mut parts = target.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).map_err(|e| ForwardError::Failed(format!("invalid upstream URI: {e}")))
}

/// Send the buffered request upstream and buffer the whole response.
pub async fn forward(
    client: &HttpClient,
    target: &Uri,
    parts: &request::Parts,
    body: Bytes,
) -> Result<UpstreamResponse, ForwardError> {
    let uri = upstream_uri(target, &parts.uri)?;
    debug!("Forwarding {} {}", parts.method, uri);

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);

    // Copy headers (skip host, the client sets it from the upstream URI)
    for (key, value) in parts.headers.iter() {
        if *key != HOST {
            builder = builder.header(key, value);
        }
    }

    let upstream_req = builder
        .body(BoxBody::new(
            Full::new(body).map_err(|never: Infallible| match never {}),
        ))
        .map_err(|e| ForwardError::Failed(format!("invalid upstream request: {e}")))?;

    let start = Instant::now();
    let response = client.request(upstream_req).await.map_err(|e| {
        let message = error_chain(&e);
        if e.is_connect() {
            ForwardError::Unreachable(message)
        } else {
            ForwardError::Failed(message)
        }
    })?;

    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| ForwardError::Failed(format!("failed to read upstream response: {e}")))?
        .to_bytes();

    metrics::record_upstream_duration(
        parts.status.as_u16(),
        start.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(UpstreamResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// Error message including its sources; hyper's top-level message alone is
/// rarely useful ("client error (Connect)").
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
