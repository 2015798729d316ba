//! Per-request orchestration: decide, then mock or forward.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::http::request;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

use super::context::ProxyContext;
use super::forwarding::{forward, ForwardError, UpstreamResponse};
use super::mock::mock_response;
use super::response_ext::{
    empty_response, error_response, text_response, ProxyBody, ResponseExt,
};
use super::tunnel::handle_connect;
use crate::admin_api;
use crate::fingerprint::Fingerprint;
use crate::metrics::{self, Outcome};
use crate::recording::should_record;
use crate::rules::{Decision, MockResponse};

/// Path prefix of the administrative JSON API.
pub const API_PREFIX: &str = "/__api";
/// Path prefix of the static admin UI, which this server does not serve.
pub const ADMIN_UI_PREFIX: &str = "/__admin";

/// Entry point for every request on the proxy port.
pub async fn handle_request(
    ctx: Arc<ProxyContext>,
    req: Request<Incoming>,
) -> Result<Response<ProxyBody>, Infallible> {
    let path = req.uri().path();
    if path.starts_with(API_PREFIX) {
        return Ok(admin_api::handle_admin_request(req, ctx).await.into_boxed());
    }
    if path.starts_with(ADMIN_UI_PREFIX) {
        return Ok(empty_response(StatusCode::NOT_FOUND));
    }
    if !ctx.is_accepting() {
        metrics::record_outcome(Outcome::Paused);
        return Ok(
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Proxy is not accepting traffic")
                .into_boxed(),
        );
    }
    if req.method() == Method::CONNECT {
        return Ok(handle_connect(ctx, req).await);
    }

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to read request body: {e}"),
            )
            .into_boxed());
        }
    };

    Ok(proxy_request(&ctx, parts, body).await.into_boxed())
}

async fn proxy_request(
    ctx: &ProxyContext,
    parts: request::Parts,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let method = parts.method.as_str();
    let fingerprint = Fingerprint::from_uri(method, &parts.uri, &body);
    let (config, rules) = ctx.config.current();

    let decision = ctx
        .engine
        .decide(&config, &rules, method, parts.uri.path(), &fingerprint);

    if !decision.proxy {
        return serve_decision(decision);
    }

    // Validated at startup and on every config update.
    let target = match config.target_uri() {
        Ok(target) => target,
        Err(e) => {
            metrics::record_outcome(Outcome::UpstreamError);
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy error: {e}"));
        }
    };

    match forward(&ctx.http_client, &target, &parts, body.clone()).await {
        Ok(upstream) => {
            debug!(
                "{} {} -> {} ({} bytes in, {} bytes out)",
                method,
                parts.uri,
                upstream.status,
                body.len(),
                upstream.body.len()
            );
            let status = upstream.status.as_u16();
            if should_record(decision.record, status, &config) {
                let added = ctx.recorder.record(
                    &fingerprint,
                    status,
                    &upstream.headers,
                    &upstream.body,
                    &parts.headers,
                );
                metrics::record_outcome(if added { Outcome::Recorded } else { Outcome::Proxied });
            } else {
                if status >= 500 {
                    info!("Skipping recording of {} {} (status {})", method, parts.uri, status);
                }
                metrics::record_outcome(Outcome::Proxied);
            }
            upstream_response(upstream)
        }
        Err(ForwardError::Unreachable(message)) => {
            warn!("Upstream unreachable for {} {}: {}", method, parts.uri, message);
            match ctx.engine.cached_record(&fingerprint) {
                Some((record, _)) => {
                    info!("Serving cached response for {} {}", method, parts.uri);
                    metrics::record_outcome(Outcome::CacheFallback);
                    mock_response(&MockResponse::from_record(&record))
                }
                None => {
                    metrics::record_outcome(Outcome::UpstreamError);
                    text_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Proxy error: {message}"),
                    )
                }
            }
        }
        Err(ForwardError::Failed(message)) => {
            error!("Problem with upstream request {} {}: {}", method, parts.uri, message);
            metrics::record_outcome(Outcome::UpstreamError);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy error: {message}"))
        }
    }
}

fn serve_decision(decision: Decision) -> Response<Full<Bytes>> {
    metrics::record_outcome(Outcome::Mock);
    match decision.mock {
        Some(mock) => {
            debug!(
                "Serving mock ({}, rule {:?}, pinned {})",
                mock.status, decision.applied_rule, decision.variant
            );
            mock_response(&mock)
        }
        None => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

/// Upstream status, headers and body, untouched.
fn upstream_response(upstream: UpstreamResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::headers::X_NIGHTMOCK;

    #[test]
    fn test_decision_without_mock_is_bare_404() {
        let decision = Decision {
            proxy: false,
            ..Default::default()
        };
        let response = serve_decision(decision);
        assert_eq!(response.status(), 404);
        assert!(!response.headers().contains_key(&X_NIGHTMOCK));
    }

    #[test]
    fn test_upstream_response_is_verbatim() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("x-upstream", "1".parse().unwrap());
        let response = upstream_response(UpstreamResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"created"),
        });
        assert_eq!(response.status(), 201);
        assert_eq!(response.headers()["x-upstream"], "1");
        assert!(!response.headers().contains_key("access-control-allow-origin"));
    }
}
