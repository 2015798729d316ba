//! Per-request decisions produced by the decision engine.

use crate::recording::{HeaderField, Headers, Record};

/// Header stamped on every response that did not come from upstream.
pub const MOCK_MARKER_HEADER: &str = "x-nightmock";
pub const MOCK_MARKER_VALUE: &str = "mock";

/// A response served without contacting upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl MockResponse {
    /// Serve a recorded variant, marked as mocked.
    pub fn from_record(record: &Record) -> Self {
        let mut mock = Self {
            status: record.status_code,
            headers: record.response_headers.clone(),
            body: record.response.clone(),
        };
        mock.mark();
        mock
    }

    /// JSON `{"error": message}` with the given status, marked as mocked.
    pub fn json_error(status: u16, message: &str) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            "content-type".to_string(),
            HeaderField::Single("application/json".to_string()),
        );
        let mut mock = Self {
            status,
            headers,
            body: serde_json::json!({ "error": message }).to_string(),
        };
        mock.mark();
        mock
    }

    fn mark(&mut self) {
        self.headers.insert(
            MOCK_MARKER_HEADER.to_string(),
            HeaderField::Single(MOCK_MARKER_VALUE.to_string()),
        );
    }
}

/// Outcome of evaluating rules for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Forward to upstream
    pub proxy: bool,
    pub mock: Option<MockResponse>,
    /// Pattern of the rule that decided, `None` when the fallback applied
    pub applied_rule: Option<String>,
    /// The mock came from an operator pin
    pub variant: bool,
    /// Explicit recording instruction for proxied requests
    pub record: Option<bool>,
}

impl Decision {
    /// Forward upstream. `record` is `None` when the recording policy should
    /// decide from the upstream status.
    pub fn forward(record: Option<bool>, applied_rule: Option<String>) -> Self {
        Self {
            proxy: true,
            record,
            applied_rule,
            ..Default::default()
        }
    }

    pub fn serve(mock: MockResponse, applied_rule: Option<String>, variant: bool) -> Self {
        Self {
            proxy: false,
            mock: Some(mock),
            applied_rule,
            variant,
            record: None,
        }
    }
}
