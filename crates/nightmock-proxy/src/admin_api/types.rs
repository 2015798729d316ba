//! Admin API request types and response helpers.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{Rule, RuleAction};
use crate::fingerprint::{path_segments, Fingerprint, NO_BODY, NO_QUERY};
use crate::recording::{HeaderField, Headers, Record};

// =============================================================================
// Request types
// =============================================================================

/// Addresses one variant: fingerprint parts plus the variant key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRef {
    pub method: String,
    #[serde(default)]
    pub path_parts: Vec<String>,
    #[serde(default)]
    pub query_key: Option<String>,
    #[serde(default)]
    pub body_key: Option<String>,
    pub response: String,
}

impl VariantRef {
    /// `[method, ...pathParts, queryKey, bodyKey]`; missing or empty keys
    /// become `no_query` / `no_body`. The method is used as given, matching
    /// the stored tree key.
    pub fn prefix(&self) -> Vec<String> {
        let mut prefix = Vec::with_capacity(self.path_parts.len() + 3);
        prefix.push(self.method.clone());
        prefix.extend(self.path_parts.iter().cloned());
        prefix.push(key_or(self.query_key.as_deref(), NO_QUERY));
        prefix.push(key_or(self.body_key.as_deref(), NO_BODY));
        prefix
    }
}

fn key_or(key: Option<&str>, placeholder: &str) -> String {
    match key {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => placeholder.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVariantRequest {
    #[serde(flatten)]
    pub variant: VariantRef,
    pub new_response: String,
}

/// Target of a replace: like [`VariantRef`] but the variant key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceTarget {
    pub method: String,
    #[serde(default)]
    pub path_parts: Vec<String>,
    #[serde(default)]
    pub query_key: Option<String>,
    #[serde(default)]
    pub body_key: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

impl ReplaceTarget {
    pub fn prefix(&self) -> Vec<String> {
        VariantRef {
            method: self.method.clone(),
            path_parts: self.path_parts.clone(),
            query_key: self.query_key.clone(),
            body_key: self.body_key.clone(),
            response: String::new(),
        }
        .prefix()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRecordRequest {
    pub selection: ReplaceTarget,
    pub new_record: Record,
}

/// A raw tree path, e.g. `[method, ...segments, query, body, responseKey]`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathRequest {
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecordRequest {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub request: Option<serde_json::Value>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractItem {
    #[serde(default, alias = "method")]
    pub http_method: Option<String>,
    #[serde(default, alias = "path")]
    pub uri: Option<String>,
    #[serde(default)]
    pub request: Option<serde_json::Value>,
    #[serde(default, alias = "status")]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportContractRequest {
    #[serde(default)]
    pub items: Vec<ContractItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadEnvRequest {
    pub data: crate::recording::VariantTree,
}

/// Typed subset of the config the admin API may change. Absent fields are
/// left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default)]
    pub offline_mode: Option<bool>,
    #[serde(default)]
    pub record_only_mode: Option<bool>,
    #[serde(default, rename = "skip5xx")]
    pub skip_5xx: Option<bool>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub log_level: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRulesRequest {
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub fallback: Option<RuleAction>,
}

/// Body of `POST /rules/save`.
#[derive(Debug, Clone, Deserialize)]
pub struct SavePresetRequest {
    pub filename: String,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub fallback: Option<RuleAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetNameRequest {
    pub filename: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_url() -> String {
    "/".to_string()
}

/// A manual variant: where it goes and what it holds.
#[derive(Debug, Clone)]
pub struct ManualVariant {
    pub fingerprint: Fingerprint,
    pub record: Record,
}

impl ManualVariant {
    /// Build from the loose admin shape. The request object, when it is a
    /// non-empty object or any other non-null value, is JSON text in the body
    /// key; a non-string response is stored as its JSON text.
    pub fn new(
        method: &str,
        url: &str,
        request: Option<&serde_json::Value>,
        status: Option<u16>,
        response: Option<&serde_json::Value>,
    ) -> Self {
        let (path, query) = split_url(url);
        let body_key = match request {
            None | Some(serde_json::Value::Null) => NO_BODY.to_string(),
            Some(serde_json::Value::Object(map)) if map.is_empty() => NO_BODY.to_string(),
            Some(value) => value.to_string(),
        };
        let text = match response {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
        };

        let mut record = Record::new(text, status.unwrap_or(200));
        record.response_headers = json_content_type();
        Self {
            fingerprint: Fingerprint::new(method, path_segments(path), query, &body_key),
            record,
        }
    }
}

fn json_content_type() -> Headers {
    let mut headers = Headers::new();
    headers.insert(
        "content-type".to_string(),
        HeaderField::Single("application/json".to_string()),
    );
    headers
}

/// Path and raw query of a URL that may be absolute or origin-form.
fn split_url(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let after_authority = match without_fragment.find("://") {
        Some(idx) => {
            let rest = &without_fragment[idx + 3..];
            match rest.find(['/', '?']) {
                Some(start) => &rest[start..],
                None => "",
            }
        }
        None => without_fragment,
    };
    match after_authority.split_once('?') {
        Some((path, query)) => (path, query),
        None => (after_authority, ""),
    }
}

/// First value of a query parameter, percent-decoded.
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).ok()?;
        if key != name {
            return None;
        }
        let value = value.replace('+', " ");
        urlencoding::decode(&value).ok().map(|v| v.into_owned())
    })
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// `{"ok": true}`
pub fn ok() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({ "ok": true }))
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Create a not found response
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "API not found")
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

/// Collect and parse a JSON body; the error is a ready 400 response.
pub async fn parse_json<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<Full<Bytes>>> {
    let body = collect_body(req).await.map_err(|e| bad_request(&e))?;
    serde_json::from_slice(&body).map_err(|e| bad_request(&format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_ref_prefix_defaults() {
        let v: VariantRef = serde_json::from_str(
            r#"{"method": "GET", "pathParts": ["orders"], "queryKey": "", "response": "r"}"#,
        )
        .unwrap();
        assert_eq!(v.prefix(), vec!["GET", "orders", "no_query", "no_body"]);
    }

    #[test]
    fn test_update_request_flattens() {
        let u: UpdateVariantRequest = serde_json::from_str(
            r#"{"method": "POST", "pathParts": [], "bodyKey": "{}", "response": "old", "newResponse": "new"}"#,
        )
        .unwrap();
        assert_eq!(u.variant.response, "old");
        assert_eq!(u.new_response, "new");
        assert_eq!(u.variant.prefix(), vec!["POST", "no_query", "{}"]);
    }

    #[test]
    fn test_manual_variant_keys() {
        let request = serde_json::json!({"user": "a"});
        let response = serde_json::json!({"token": "t"});
        let v = ManualVariant::new(
            "post",
            "/login?x=1",
            Some(&request),
            Some(201),
            Some(&response),
        );
        assert_eq!(v.fingerprint.method, "POST");
        assert_eq!(v.fingerprint.segments, vec!["login"]);
        assert_eq!(v.fingerprint.query_key, "x=1");
        assert_eq!(v.fingerprint.body_key, r#"{"user":"a"}"#);
        assert_eq!(v.record.response, r#"{"token":"t"}"#);
        assert_eq!(v.record.status_code, 201);
        assert!(v.record.response_headers.contains_key("content-type"));
    }

    #[test]
    fn test_manual_variant_empty_request_and_string_response() {
        let empty = serde_json::json!({});
        let text = serde_json::json!("plain");
        let v = ManualVariant::new("GET", "/", Some(&empty), None, Some(&text));
        assert!(v.fingerprint.segments.is_empty());
        assert_eq!(v.fingerprint.body_key, NO_BODY);
        assert_eq!(v.fingerprint.query_key, NO_QUERY);
        assert_eq!(v.record.response, "plain");
        assert_eq!(v.record.status_code, 200);
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/a/b?c=d"), ("/a/b", "c=d"));
        assert_eq!(split_url("http://host:1/x?y=1#frag"), ("/x", "y=1"));
        assert_eq!(split_url("https://host"), ("", ""));
        assert_eq!(split_url("/plain"), ("/plain", ""));
    }

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param(Some("x=1&filename=night%20shift.json"), "filename").as_deref(),
            Some("night shift.json")
        );
        assert_eq!(query_param(Some("filename="), "filename").as_deref(), Some(""));
        assert!(query_param(Some("other=1"), "filename").is_none());
        assert!(query_param(None, "filename").is_none());
    }

    #[test]
    fn test_contract_item_aliases() {
        let item: ContractItem =
            serde_json::from_str(r#"{"method": "PUT", "path": "/x", "status": 204}"#).unwrap();
        assert_eq!(item.http_method.as_deref(), Some("PUT"));
        assert_eq!(item.uri.as_deref(), Some("/x"));
        assert_eq!(item.http_status, Some(204));
    }
}
