//! Rule set handlers: the live rules and saved presets.

use crate::admin_api::types::*;
use crate::config::RuleAction;
use crate::proxy::ProxyContext;
use crate::rules::{PresetError, RulePreset};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::error;

/// GET /rules/current
pub fn handle_current(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    let config = ctx.config.get();
    json_response(
        StatusCode::OK,
        &serde_json::json!({"rules": config.rules, "fallback": config.fallback}),
    )
}

/// POST /rules/apply - Replace the rules and/or the fallback
pub fn handle_apply(ctx: &ProxyContext, request: ApplyRulesRequest) -> Response<Full<Bytes>> {
    if request.rules.is_none() && request.fallback.is_none() {
        return bad_request("Expected rules and/or fallback");
    }

    let config = ctx.config.update(|cfg| {
        if let Some(rules) = request.rules {
            cfg.rules = rules;
        }
        if let Some(fallback) = request.fallback {
            cfg.fallback = Some(fallback);
        }
    });

    if let Err(e) = ctx.config.persist() {
        error!("Failed to write config file: {:#}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to write config file: {e}"),
        );
    }

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "ok": true,
            "rules": config.rules,
            "fallback": config.fallback,
        }),
    )
}

fn preset_error(e: PresetError) -> Response<Full<Bytes>> {
    match e {
        PresetError::InvalidName(_) => bad_request(&e.to_string()),
        PresetError::NotFound(_) => error_response(StatusCode::NOT_FOUND, &e.to_string()),
        PresetError::Io(_) | PresetError::Parse(_) => {
            error!("Rule preset error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// POST /rules/save - Store a named preset; the fallback defaults to Return Mock
pub fn handle_save_preset(ctx: &ProxyContext, request: SavePresetRequest) -> Response<Full<Bytes>> {
    let preset = RulePreset {
        rules: request.rules,
        fallback: request.fallback.unwrap_or(RuleAction::ReturnMock),
    };
    match ctx.presets.save(&request.filename, &preset) {
        Ok(file) => json_response(StatusCode::OK, &serde_json::json!({"ok": true, "saved": file})),
        Err(e) => preset_error(e),
    }
}

/// GET /rules/list - Saved preset file names
pub fn handle_list_presets(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    match ctx.presets.list() {
        Ok(names) => json_response(StatusCode::OK, &names),
        Err(e) => preset_error(e),
    }
}

/// GET /rules/load?filename= - One preset, without applying it
pub fn handle_load_preset(ctx: &ProxyContext, query: Option<&str>) -> Response<Full<Bytes>> {
    let Some(name) = query_param(query, "filename").filter(|n| !n.is_empty()) else {
        return bad_request("filename required");
    };
    match ctx.presets.load(&name) {
        Ok(preset) => json_response(StatusCode::OK, &preset),
        Err(e) => preset_error(e),
    }
}

/// POST /rules/delete
pub fn handle_delete_preset(ctx: &ProxyContext, request: PresetNameRequest) -> Response<Full<Bytes>> {
    match ctx.presets.delete(&request.filename) {
        Ok(()) => ok(),
        Err(PresetError::NotFound(file)) => bad_request(&format!("Preset '{file}' not found")),
        Err(e) => preset_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn context(dir: &tempfile::TempDir) -> std::sync::Arc<ProxyContext> {
        let mut config = Config::new("http://localhost:3000");
        config.data_dir = dir.path().join("data");
        ProxyContext::new(config, Some(dir.path().join("config.json")))
    }

    #[test]
    fn test_apply_requires_something() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let request: ApplyRulesRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(handle_apply(&ctx, request).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_apply_rules_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let request: ApplyRulesRequest = serde_json::from_str(
            r#"{
                "rules": [{"enabled": true, "pattern": "GET /users/*", "action": "Return Mock"}],
                "fallback": "Pass Only"
            }"#,
        )
        .unwrap();

        let resp = handle_apply(&ctx, request);
        assert_eq!(resp.status(), StatusCode::OK);

        let (config, rules) = ctx.config.current();
        assert_eq!(config.fallback, Some(RuleAction::PassOnly));
        assert_eq!(rules.len(), 1);
        assert!(rules[0].matches("GET", "/users/1"));

        let saved = Config::from_file(dir.path().join("config.json")).unwrap();
        assert_eq!(saved.rules.len(), 1);
        assert_eq!(saved.fallback, Some(RuleAction::PassOnly));
    }

    #[test]
    fn test_apply_fallback_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        ctx.config.update(|cfg| {
            cfg.rules = vec![crate::config::Rule::new("/a", RuleAction::PassOnly)];
        });

        let request: ApplyRulesRequest =
            serde_json::from_str(r#"{"fallback": "ReturnMock"}"#).unwrap();
        assert_eq!(handle_apply(&ctx, request).status(), StatusCode::OK);
        assert_eq!(ctx.config.get().rules.len(), 1);
        assert_eq!(ctx.config.get().fallback, Some(RuleAction::ReturnMock));
    }

    #[test]
    fn test_current() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        assert_eq!(handle_current(&ctx).status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_preset_save_list_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let request: SavePresetRequest = serde_json::from_str(
            r#"{"filename": "night", "rules": [{"pattern": "/a", "action": "Pass Only"}]}"#,
        )
        .unwrap();

        let body = body_json(handle_save_preset(&ctx, request)).await;
        assert_eq!(body["saved"], "night.json");
        assert!(dir.path().join("data").join("rules").join("night.json").exists());

        let body = body_json(handle_list_presets(&ctx)).await;
        assert_eq!(body, serde_json::json!(["night.json"]));

        let resp = handle_load_preset(&ctx, Some("filename=night"));
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["fallback"], "Return Mock");
        assert_eq!(body["rules"][0]["pattern"], "/a");

        let request: PresetNameRequest =
            serde_json::from_str(r#"{"filename": "night.json"}"#).unwrap();
        assert_eq!(handle_delete_preset(&ctx, request).status(), StatusCode::OK);
        let body = body_json(handle_list_presets(&ctx)).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[test]
    fn test_preset_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let request: SavePresetRequest =
            serde_json::from_str(r#"{"filename": "../config", "rules": []}"#).unwrap();
        assert_eq!(
            handle_save_preset(&ctx, request).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(!dir.path().join("config.json").exists());

        assert_eq!(
            handle_load_preset(&ctx, Some("filename=..%2Fconfig")).status(),
            StatusCode::BAD_REQUEST
        );
        let request: PresetNameRequest =
            serde_json::from_str(r#"{"filename": "a/b"}"#).unwrap();
        assert_eq!(
            handle_delete_preset(&ctx, request).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_preset_missing_or_unnamed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        assert_eq!(handle_load_preset(&ctx, None).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            handle_load_preset(&ctx, Some("filename=ghost")).status(),
            StatusCode::NOT_FOUND
        );
        let request: PresetNameRequest = serde_json::from_str(r#"{"filename": "ghost"}"#).unwrap();
        assert_eq!(handle_delete_preset(&ctx, request).status(), StatusCode::BAD_REQUEST);
    }
}
