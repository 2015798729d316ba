//! Variant store and selection handlers.

use std::collections::BTreeMap;

use crate::admin_api::types::*;
use crate::proxy::ProxyContext;
use crate::recording::{Node, StoreError};
use crate::selection::SelectionStore;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::{error, info};

fn store_error(e: StoreError) -> Response<Full<Bytes>> {
    match e {
        StoreError::NotFound(_) => bad_request(&e.to_string()),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// Render the tree, marking the pinned variant of every prefix with
/// `"selected": true`.
fn decorate(
    children: &BTreeMap<String, Node>,
    path: &mut Vec<String>,
    selections: &SelectionStore,
) -> serde_json::Value {
    let has_records = children.values().any(|n| matches!(n, Node::Record(_)));
    let selected = if has_records && !path.is_empty() {
        selections.get_selection(path)
    } else {
        None
    };

    let mut out = serde_json::Map::new();
    for (key, node) in children {
        let value = match node {
            Node::Record(record) => {
                let mut value = serde_json::to_value(record).unwrap_or_default();
                if selected.as_deref() == Some(key.as_str()) {
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert("selected".to_string(), serde_json::Value::Bool(true));
                    }
                }
                value
            }
            Node::Branch(grandchildren) => {
                path.push(key.clone());
                let value = decorate(grandchildren, path, selections);
                path.pop();
                value
            }
        };
        out.insert(key.clone(), value);
    }
    serde_json::Value::Object(out)
}

/// GET /recordings
pub fn handle_list(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    let tree = ctx.store.snapshot();
    let body = decorate(tree.root(), &mut Vec::new(), &ctx.selections);
    json_response(StatusCode::OK, &body)
}

/// POST /save - Write the snapshot now
pub fn handle_save(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    if ctx.persister.force_save() {
        json_response(StatusCode::OK, &serde_json::json!({"saved": true}))
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save recordings")
    }
}

/// POST /clear
pub fn handle_clear(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    ctx.store.clear();
    ctx.persister.schedule_save();
    info!("Recordings cleared");
    json_response(StatusCode::OK, &serde_json::json!({"cleared": true}))
}

/// POST /load-env - Replace the whole store
pub fn handle_load_env(ctx: &ProxyContext, request: LoadEnvRequest) -> Response<Full<Bytes>> {
    ctx.store.replace_all(request.data);
    ctx.persister.schedule_save();
    info!("Recordings replaced ({} variants)", ctx.store.variant_count());
    ok()
}

/// POST /add-record - Manual variant, overwriting an existing key
pub fn handle_add_record(ctx: &ProxyContext, request: AddRecordRequest) -> Response<Full<Bytes>> {
    let variant = ManualVariant::new(
        &request.method,
        &request.url,
        request.request.as_ref(),
        request.http_status,
        request.response.as_ref(),
    );
    let prefix = variant.fingerprint.prefix();
    let key = variant.record.response.clone();
    ctx.store.upsert_variant(&prefix, &key, variant.record);
    ctx.persister.schedule_save();
    ok()
}

/// POST /import-contract - Bulk manual variants
pub fn handle_import_contract(
    ctx: &ProxyContext,
    request: ImportContractRequest,
) -> Response<Full<Bytes>> {
    if request.items.is_empty() {
        return bad_request("Expected a non-empty items array");
    }

    let mut imported = 0;
    for item in &request.items {
        let variant = ManualVariant::new(
            item.http_method.as_deref().unwrap_or("GET"),
            item.uri.as_deref().unwrap_or("/"),
            item.request.as_ref(),
            item.http_status,
            item.response.as_ref(),
        );
        let prefix = variant.fingerprint.prefix();
        let key = variant.record.response.clone();
        ctx.store.upsert_variant(&prefix, &key, variant.record);
        imported += 1;
    }
    ctx.persister.schedule_save();
    info!("Imported {} contract items", imported);

    json_response(
        StatusCode::OK,
        &serde_json::json!({"ok": true, "imported": imported}),
    )
}

fn pin(ctx: &ProxyContext, prefix: &[String], key: &str) -> Response<Full<Bytes>> {
    if ctx.store.get_variant(prefix, key).is_none() {
        return bad_request("Recording not found");
    }
    match ctx.selections.set_selection(prefix, key) {
        Ok(()) => ok(),
        Err(e) => {
            error!("Failed to write selection: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// POST /recording/select
pub fn handle_select(ctx: &ProxyContext, variant: VariantRef) -> Response<Full<Bytes>> {
    pin(ctx, &variant.prefix(), &variant.response)
}

/// POST /recording/select-by-path - `[...prefix, responseKey]`
pub fn handle_select_by_path(ctx: &ProxyContext, request: PathRequest) -> Response<Full<Bytes>> {
    match request.path.split_last() {
        Some((key, prefix)) if !prefix.is_empty() => pin(ctx, prefix, key),
        _ => bad_request("Expected a path of at least two elements"),
    }
}

/// POST /recording/unselect - `{path: prefix}`
pub fn handle_unselect(ctx: &ProxyContext, request: PathRequest) -> Response<Full<Bytes>> {
    if request.path.is_empty() {
        return bad_request("Expected a non-empty path");
    }
    match ctx.selections.clear_selection(&request.path) {
        Ok(cleared) => json_response(
            StatusCode::OK,
            &serde_json::json!({"ok": true, "cleared": cleared}),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /recording - One variant
pub fn handle_delete_variant(ctx: &ProxyContext, variant: VariantRef) -> Response<Full<Bytes>> {
    match ctx.store.delete_variant(&variant.prefix(), &variant.response) {
        Ok(()) => {
            ctx.persister.schedule_save();
            ok()
        }
        Err(e) => store_error(e),
    }
}

/// POST /recording/update - Re-key a variant with new response text
pub fn handle_update(ctx: &ProxyContext, request: UpdateVariantRequest) -> Response<Full<Bytes>> {
    let prefix = request.variant.prefix();
    match ctx
        .store
        .replace_variant_key(&prefix, &request.variant.response, &request.new_response)
    {
        Ok(()) => {
            ctx.persister.schedule_save();
            ok()
        }
        Err(e) => store_error(e),
    }
}

/// POST /recording/replace - Overwrite a variant, or the whole body slot when
/// no stored key is given
pub fn handle_replace(ctx: &ProxyContext, request: ReplaceRecordRequest) -> Response<Full<Bytes>> {
    let prefix = request.selection.prefix();
    match ctx.store.replace_record(
        &prefix,
        request.selection.response.as_deref(),
        request.new_record,
    ) {
        Ok(()) => {
            ctx.persister.schedule_save();
            ok()
        }
        Err(e) => store_error(e),
    }
}

/// POST /recording/delete - Any node, pruning emptied ancestors
pub fn handle_delete_path(ctx: &ProxyContext, request: PathRequest) -> Response<Full<Bytes>> {
    if request.path.is_empty() {
        return bad_request("Expected a non-empty path");
    }
    match ctx.store.delete_at_path(&request.path) {
        Ok(()) => {
            ctx.persister.schedule_save();
            ok()
        }
        Err(e) => store_error(e),
    }
}
