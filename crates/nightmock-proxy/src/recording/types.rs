//! Types for recorded responses and the variant tree.

use chrono::{DateTime, Utc};
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A header value as recorded: a single string or, for repeated headers
/// such as `set-cookie`, a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderField {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderField {
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderField::Single(v) => vec![v.as_str()],
            HeaderField::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

pub type Headers = BTreeMap<String, HeaderField>;

/// Capture a header map, lower-cased names, repeated values as a list.
pub fn headers_from_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        let values: Vec<String> = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let field = match values.len() {
            1 => HeaderField::Single(values.into_iter().next().unwrap_or_default()),
            _ => HeaderField::Multi(values),
        };
        headers.insert(name.as_str().to_string(), field);
    }
    headers
}

fn default_status() -> u16 {
    200
}

/// One recorded upstream response. Its variant key is the response text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub response: String,
    #[serde(default)]
    pub response_headers: Headers,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default)]
    pub request_headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A fresh record with every timestamp set to now.
    pub fn new(response: impl Into<String>, status_code: u16) -> Self {
        let now = Utc::now();
        Self {
            response: response.into(),
            response_headers: Headers::new(),
            status_code,
            request_headers: Headers::new(),
            recorded_at: Some(now),
            created_at: Some(now),
            modified_at: Some(now),
        }
    }

    /// Ordering key for default selection: created, else modified, else recorded.
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.modified_at).or(self.recorded_at)
    }

    /// Fill unset timestamps, `createdAt` from the oldest known one.
    pub fn fill_timestamps(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(self.recorded_at.unwrap_or(now));
        }
        if self.recorded_at.is_none() {
            self.recorded_at = Some(now);
        }
        if self.modified_at.is_none() {
            self.modified_at = Some(now);
        }
    }
}

/// A node of the variant tree.
///
/// Detection is structural: a `Record` always carries a string `response`
/// field, while branch keys are path segments or variant texts whose values
/// are objects. Untagged deserialization tries `Record` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Record(Record),
    Branch(BTreeMap<String, Node>),
}

impl Node {
    pub fn empty_branch() -> Self {
        Node::Branch(BTreeMap::new())
    }

    pub fn as_branch(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Branch(children) => Some(children),
            Node::Record(_) => None,
        }
    }

    /// Branch view of this node; a bare record is upgraded into a one-entry
    /// variant map keyed by its own response text.
    pub fn as_branch_mut(&mut self) -> &mut BTreeMap<String, Node> {
        if let Node::Record(record) = self {
            let mut children = BTreeMap::new();
            children.insert(record.response.clone(), Node::Record(record.clone()));
            *self = Node::Branch(children);
        }
        match self {
            Node::Branch(children) => children,
            Node::Record(_) => unreachable!("record nodes were upgraded above"),
        }
    }

    pub fn is_empty_branch(&self) -> bool {
        matches!(self, Node::Branch(children) if children.is_empty())
    }
}

/// Variants recorded for one fingerprint, keyed by response text.
pub type VariantMap = BTreeMap<String, Record>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hyper::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: Record = serde_json::from_str(r#"{"response": "ok"}"#).unwrap();
        assert_eq!(record.status_code, 200);
        assert!(record.response_headers.is_empty());
        assert!(record.recency().is_none());
    }

    #[test]
    fn test_recency_prefers_created_at() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut record = Record::new("x", 200);
        record.created_at = Some(t1);
        record.modified_at = Some(t2);
        assert_eq!(record.recency(), Some(t1));

        record.created_at = None;
        assert_eq!(record.recency(), Some(t2));

        record.modified_at = None;
        record.recorded_at = Some(t1);
        assert_eq!(record.recency(), Some(t1));
    }

    #[test]
    fn test_node_structural_detection() {
        let json = r#"{
            "orders": {
                "no_query": {
                    "no_body": {
                        "{\"id\":1}": {"response": "{\"id\":1}", "statusCode": 200}
                    }
                }
            }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        let variants = node.as_branch().unwrap()["orders"].as_branch().unwrap()["no_query"]
            .as_branch()
            .unwrap()["no_body"]
            .as_branch()
            .unwrap();
        assert!(matches!(variants[r#"{"id":1}"#], Node::Record(_)));
    }

    #[test]
    fn test_legacy_record_upgrade() {
        let mut node = Node::Record(Record::new("legacy", 200));
        let children = node.as_branch_mut();
        assert_eq!(children.len(), 1);
        assert!(matches!(children.get("legacy"), Some(Node::Record(r)) if r.response == "legacy"));
    }

    #[test]
    fn test_header_field_shapes() {
        let headers: Headers =
            serde_json::from_str(r#"{"content-type": "text/plain", "set-cookie": ["a=1", "b=2"]}"#)
                .unwrap();
        assert_eq!(headers["content-type"].values(), vec!["text/plain"]);
        assert_eq!(headers["set-cookie"].values(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_headers_from_map() {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        map.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        map.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        let headers = headers_from_map(&map);
        assert_eq!(
            headers["content-type"],
            HeaderField::Single("application/json".to_string())
        );
        assert_eq!(
            headers["set-cookie"],
            HeaderField::Multi(vec!["a=1".to_string(), "b=2".to_string()])
        );
    }

    #[test]
    fn test_fill_timestamps() {
        let recorded = Utc.with_ymd_and_hms(2023, 3, 3, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record: Record = serde_json::from_str(r#"{"response": "r"}"#).unwrap();
        record.recorded_at = Some(recorded);
        record.fill_timestamps(now);
        assert_eq!(record.created_at, Some(recorded));
        assert_eq!(record.recorded_at, Some(recorded));
        assert_eq!(record.modified_at, Some(now));
    }
}
