//! Administrative JSON API, served on the proxy port under `/__api`.
//!
//! This module provides endpoints for:
//! - Health, traffic start/stop and Prometheus metrics
//! - Reading and updating the live config and rule set
//! - Browsing, editing, importing and pinning recorded variants
//! - Forcing a snapshot save

mod handlers;
mod router;
mod types;

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};

use crate::proxy::ProxyContext;

/// Handle one request whose path starts with `/__api`.
pub async fn handle_admin_request(
    req: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Response<Full<Bytes>> {
    router::route_request(req, ctx).await
}
