//! Writing mocked responses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use tracing::warn;

use super::headers::{replay_headers, NightmockHeadersExt};
use crate::rules::MockResponse;

/// Render a mock: recorded headers minus hop-by-hop and framing headers,
/// permissive CORS unless the recording set its own, and the mock marker.
pub fn mock_response(mock: &MockResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(mock.status).unwrap_or_else(|_| {
        warn!("Recorded status {} is invalid, serving 200", mock.status);
        StatusCode::OK
    });

    let mut response = Response::new(Full::new(Bytes::from(mock.body.clone())));
    *response.status_mut() = status;
    *response.headers_mut() = replay_headers(&mock.headers);
    response.ensure_cors();
    response.mark_mocked();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::headers::X_NIGHTMOCK;
    use crate::recording::{HeaderField, Record};
    use http_body_util::BodyExt;
    use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, TRANSFER_ENCODING};

    #[tokio::test]
    async fn test_mock_response_from_record() {
        let mut record = Record::new(r#"{"id":1}"#, 200);
        record.response_headers.insert(
            "content-type".to_string(),
            HeaderField::Single("application/json".to_string()),
        );
        record.response_headers.insert(
            "transfer-encoding".to_string(),
            HeaderField::Single("chunked".to_string()),
        );

        let response = mock_response(&MockResponse::from_record(&record));
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(!response.headers().contains_key(TRANSFER_ENCODING));
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[&X_NIGHTMOCK], "mock");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }

    #[test]
    fn test_invalid_status_falls_back() {
        let mock = MockResponse {
            status: 42,
            headers: Default::default(),
            body: String::new(),
        };
        assert_eq!(mock_response(&mock).status(), 200);
    }
}
