//! Canonical request keys.
//!
//! A [`Fingerprint`] identifies a class of requests by method, path segments,
//! raw query text and raw body text. Query and body are never parsed or
//! normalized: two bodies that differ only in key order are different
//! fingerprints.

use hyper::Uri;
use serde::{Deserialize, Serialize};

/// Query key used when a request has no query string.
pub const NO_QUERY: &str = "no_query";
/// Body key used when a request has no body.
pub const NO_BODY: &str = "no_body";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub method: String,
    pub segments: Vec<String>,
    pub query_key: String,
    pub body_key: String,
}

impl Fingerprint {
    /// Derive a fingerprint from a method, a request target and the raw body.
    ///
    /// Total: a target that does not parse as a URI yields an empty path and
    /// `no_query`.
    pub fn derive(method: &str, url: &str, body: &[u8]) -> Self {
        match url.parse::<Uri>() {
            Ok(uri) => Self::from_uri(method, &uri, body),
            Err(_) => Self::from_parts(method, "", None, body),
        }
    }

    pub fn from_uri(method: &str, uri: &Uri, body: &[u8]) -> Self {
        Self::from_parts(method, uri.path(), uri.query(), body)
    }

    fn from_parts(method: &str, path: &str, query: Option<&str>, body: &[u8]) -> Self {
        let query_key = match query {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => NO_QUERY.to_string(),
        };
        let body_key = if body.is_empty() {
            NO_BODY.to_string()
        } else {
            String::from_utf8_lossy(body).into_owned()
        };

        Self {
            method: method.to_ascii_uppercase(),
            segments: path_segments(path),
            query_key,
            body_key,
        }
    }

    /// Build a fingerprint from already-computed parts, mapping empty query
    /// and body keys to their placeholders.
    pub fn new(
        method: &str,
        segments: Vec<String>,
        query_key: &str,
        body_key: &str,
    ) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            segments,
            query_key: non_empty_or(query_key, NO_QUERY),
            body_key: non_empty_or(body_key, NO_BODY),
        }
    }

    /// The tree path of this fingerprint: `[method, ...segments, query, body]`.
    pub fn prefix(&self) -> Vec<String> {
        let mut prefix = Vec::with_capacity(self.segments.len() + 3);
        prefix.push(self.method.clone());
        prefix.extend(self.segments.iter().cloned());
        prefix.push(self.query_key.clone());
        prefix.push(self.body_key.clone());
        prefix
    }

    /// Inverse of [`Fingerprint::prefix`]. Needs at least method, query and body.
    pub fn from_prefix(prefix: &[String]) -> Option<Self> {
        if prefix.len() < 3 {
            return None;
        }
        let (method, rest) = prefix.split_first()?;
        let (body_key, rest) = rest.split_last()?;
        let (query_key, segments) = rest.split_last()?;
        Some(Self {
            method: method.clone(),
            segments: segments.to_vec(),
            query_key: query_key.clone(),
            body_key: body_key.clone(),
        })
    }

    /// Path as seen by rule patterns, e.g. `/orders/7`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

fn non_empty_or(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// Split a path into non-empty segments after dropping one trailing `/`.
pub fn path_segments(path: &str) -> Vec<String> {
    let trimmed = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    trimmed
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
