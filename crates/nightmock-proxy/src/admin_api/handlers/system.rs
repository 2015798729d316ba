//! System handlers: health, traffic switch, config, metrics.

use crate::admin_api::types::*;
use crate::config::Config;
use crate::metrics::collect_metrics;
use crate::proxy::ProxyContext;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::{error, info, warn};

/// GET /health - Liveness check
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"ok": true}))
}

/// GET /status - Whether the proxy is accepting traffic
pub fn handle_status(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({"acceptingTraffic": ctx.is_accepting()}),
    )
}

/// POST /start, POST /stop
pub fn handle_set_accepting(ctx: &ProxyContext, accepting: bool) -> Response<Full<Bytes>> {
    ctx.set_accepting(accepting);
    handle_status(ctx)
}

/// The fields of the config that are safe to expose.
fn safe_config(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "port": config.port,
        "targetUrl": config.target_url,
        "offlineMode": config.offline_mode,
        "recordOnlyMode": config.record_only_mode,
        "logLevel": config.log_level,
        "skip5xx": config.skip_5xx,
    })
}

/// GET /config
pub fn handle_get_config(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &safe_config(&ctx.config.get()))
}

/// POST /config - Apply a typed subset and write the config file
pub fn handle_update_config(ctx: &ProxyContext, patch: ConfigPatch) -> Response<Full<Bytes>> {
    if let Some(target_url) = &patch.target_url {
        let mut candidate = (*ctx.config.get()).clone();
        candidate.target_url = target_url.clone();
        if let Err(e) = candidate.validate() {
            return bad_request(&e.to_string());
        }
    }

    let log_level = patch.log_level;
    let config = ctx.config.update(|cfg| {
        if let Some(v) = patch.offline_mode {
            cfg.offline_mode = v;
        }
        if let Some(v) = patch.record_only_mode {
            cfg.record_only_mode = v;
        }
        if let Some(v) = patch.skip_5xx {
            cfg.skip_5xx = v;
        }
        if let Some(v) = patch.target_url {
            cfg.target_url = v;
        }
        if let Some(v) = patch.log_level {
            cfg.log_level = v;
        }
    });
    if let Some(level) = log_level {
        if let Err(e) = ctx.log_level.set_level(level) {
            warn!("Failed to apply logLevel {}: {:#}", level, e);
        }
    }
    info!(
        "Config updated: offline={} recordOnly={} skip5xx={} target={}",
        config.offline_mode, config.record_only_mode, config.skip_5xx, config.target_url
    );

    if let Err(e) = ctx.config.persist() {
        error!("Failed to write config file: {:#}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to write config file: {e}"),
        );
    }

    json_response(
        StatusCode::OK,
        &serde_json::json!({"ok": true, "config": safe_config(&config)}),
    )
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}
