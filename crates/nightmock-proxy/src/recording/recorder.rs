//! Recording of upstream responses into the variant store.

use std::sync::Arc;

use hyper::HeaderMap;
use tracing::{debug, info};

use super::persistence::Persister;
use super::store::VariantStore;
use super::types::{headers_from_map, Record};
use crate::config::Config;
use crate::fingerprint::Fingerprint;

/// Whether an upstream response with `status` should be recorded.
///
/// An explicit flag from the rule or fallback decision always wins. Without
/// one, 5xx responses are skipped unless record-only mode is on and
/// `skip5xx` is off.
pub fn should_record(explicit: Option<bool>, status: u16, config: &Config) -> bool {
    if let Some(record) = explicit {
        return record;
    }
    if status >= 500 && (config.skip_5xx || !config.record_only_mode) {
        return false;
    }
    true
}

/// Writes upstream responses into the store and schedules a snapshot.
pub struct Recorder {
    store: Arc<VariantStore>,
    persister: Arc<Persister>,
}

impl Recorder {
    pub fn new(store: Arc<VariantStore>, persister: Arc<Persister>) -> Self {
        Self { store, persister }
    }

    /// Record one response as a variant of `fingerprint`. Returns `false`
    /// when the same response text was already recorded.
    pub fn record(
        &self,
        fingerprint: &Fingerprint,
        status: u16,
        response_headers: &HeaderMap,
        body: &[u8],
        request_headers: &HeaderMap,
    ) -> bool {
        let text = String::from_utf8_lossy(body).into_owned();
        let mut record = Record::new(text.clone(), status);
        record.response_headers = headers_from_map(response_headers);
        record.request_headers = headers_from_map(request_headers);

        if self.store.put_variant(fingerprint, &text, record) {
            info!(
                "Recorded {} {} ({} bytes, status {})",
                fingerprint.method,
                fingerprint.path(),
                body.len(),
                status
            );
            self.persister.schedule_save();
            true
        } else {
            debug!(
                "Response for {} {} already recorded",
                fingerprint.method,
                fingerprint.path()
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE};

    fn config(record_only: bool, skip_5xx: bool) -> Config {
        let mut config = Config::new("http://localhost:3000");
        config.record_only_mode = record_only;
        config.skip_5xx = skip_5xx;
        config
    }

    #[test]
    fn test_explicit_flag_wins() {
        let cfg = config(false, true);
        assert!(should_record(Some(true), 503, &cfg));
        assert!(!should_record(Some(false), 200, &cfg));
    }

    #[test]
    fn test_5xx_skipped_by_default() {
        let cfg = config(false, false);
        assert!(should_record(None, 200, &cfg));
        assert!(should_record(None, 404, &cfg));
        assert!(!should_record(None, 500, &cfg));
    }

    #[test]
    fn test_record_only_records_5xx() {
        assert!(should_record(None, 502, &config(true, false)));
        assert!(!should_record(None, 502, &config(true, true)));
    }

    #[test]
    fn test_record_dedupes_and_captures_headers() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(VariantStore::new());
        let persister = Persister::new(store.clone(), dir.path().join("recorded_data.json"));
        let recorder = Recorder::new(store.clone(), persister);

        let fp = Fingerprint::derive("GET", "/orders", b"");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        assert!(recorder.record(&fp, 200, &headers, br#"{"id":1}"#, &HeaderMap::new()));
        assert!(!recorder.record(&fp, 200, &headers, br#"{"id":1}"#, &HeaderMap::new()));

        let variants = store.lookup(&fp).unwrap();
        assert_eq!(variants.len(), 1);
        let record = &variants[r#"{"id":1}"#];
        assert_eq!(record.status_code, 200);
        assert!(record.response_headers.contains_key("content-type"));
        assert!(record.created_at.is_some());
    }
}
