//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{recordings, rules, system};
use crate::admin_api::types::{not_found, parse_json};
use crate::proxy::{ProxyContext, API_PREFIX};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let full_path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());
    let path = full_path
        .strip_prefix(API_PREFIX)
        .unwrap_or(&full_path)
        .to_string();

    debug!("Admin API: {} {}", method, full_path);

    route_by_path(&method, &path, query.as_deref(), req, &ctx).await
}

/// Parse the JSON body and hand it to `handler`, or answer 400.
async fn with_body<T, F>(req: Request<Incoming>, handler: F) -> Response<Full<Bytes>>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Response<Full<Bytes>>,
{
    match parse_json(req).await {
        Ok(body) => handler(body),
        Err(resp) => resp,
    }
}

/// Route based on path
async fn route_by_path(
    method: &Method,
    path: &str,
    query: Option<&str>,
    req: Request<Incoming>,
    ctx: &ProxyContext,
) -> Response<Full<Bytes>> {
    match (method, path) {
        // System
        (&Method::GET, "/health") => system::handle_health(),
        (&Method::GET, "/status") => system::handle_status(ctx),
        (&Method::POST, "/start") => system::handle_set_accepting(ctx, true),
        (&Method::POST, "/stop") => system::handle_set_accepting(ctx, false),
        (&Method::GET, "/config") => system::handle_get_config(ctx),
        (&Method::POST, "/config") => {
            with_body(req, |patch| system::handle_update_config(ctx, patch)).await
        }
        (&Method::GET, "/metrics") => system::handle_metrics(),

        // Rules
        (&Method::GET, "/rules/current") => rules::handle_current(ctx),
        (&Method::POST, "/rules/apply") => {
            with_body(req, |body| rules::handle_apply(ctx, body)).await
        }
        (&Method::GET, "/rules/list") => rules::handle_list_presets(ctx),
        (&Method::GET, "/rules/load") => rules::handle_load_preset(ctx, query),
        (&Method::POST, "/rules/save") => {
            with_body(req, |body| rules::handle_save_preset(ctx, body)).await
        }
        (&Method::POST, "/rules/delete") => {
            with_body(req, |body| rules::handle_delete_preset(ctx, body)).await
        }

        // Whole store
        (&Method::GET, "/recordings") => recordings::handle_list(ctx),
        (&Method::POST, "/save") => recordings::handle_save(ctx),
        (&Method::POST, "/clear") => recordings::handle_clear(ctx),
        (&Method::POST, "/load-env") => {
            with_body(req, |body| recordings::handle_load_env(ctx, body)).await
        }
        (&Method::POST, "/add-record") => {
            with_body(req, |body| recordings::handle_add_record(ctx, body)).await
        }
        (&Method::POST, "/import-contract") => {
            with_body(req, |body| recordings::handle_import_contract(ctx, body)).await
        }

        // Single variants and selections
        (&Method::POST, "/recording/select") => {
            with_body(req, |body| recordings::handle_select(ctx, body)).await
        }
        (&Method::POST, "/recording/select-by-path") => {
            with_body(req, |body| recordings::handle_select_by_path(ctx, body)).await
        }
        (&Method::POST, "/recording/unselect") => {
            with_body(req, |body| recordings::handle_unselect(ctx, body)).await
        }
        (&Method::DELETE, "/recording") => {
            with_body(req, |body| recordings::handle_delete_variant(ctx, body)).await
        }
        (&Method::POST, "/recording/update") => {
            with_body(req, |body| recordings::handle_update(ctx, body)).await
        }
        (&Method::POST, "/recording/replace") => {
            with_body(req, |body| recordings::handle_replace(ctx, body)).await
        }
        (&Method::POST, "/recording/delete") => {
            with_body(req, |body| recordings::handle_delete_path(ctx, body)).await
        }

        _ => not_found(),
    }
}
