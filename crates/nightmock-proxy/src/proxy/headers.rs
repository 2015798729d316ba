//! Header names and helpers for mocked responses.

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_ENCODING,
    CONTENT_LENGTH, TRANSFER_ENCODING,
};
use hyper::Response;
use tracing::debug;

use crate::recording::{HeaderField, Headers};
use crate::rules::{MOCK_MARKER_HEADER, MOCK_MARKER_VALUE};

pub static X_NIGHTMOCK: HeaderName = HeaderName::from_static(MOCK_MARKER_HEADER);
pub static KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

pub static VALUE_MOCK: HeaderValue = HeaderValue::from_static(MOCK_MARKER_VALUE);
pub static VALUE_ANY: HeaderValue = HeaderValue::from_static("*");
pub static VALUE_CORS_METHODS: HeaderValue =
    HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS");

/// Headers never replayed from a recording: hop-by-hop and framing headers
/// that would not describe the body we actually send.
pub fn is_stripped(name: &HeaderName) -> bool {
    *name == CONNECTION
        || *name == KEEP_ALIVE
        || *name == TRANSFER_ENCODING
        || *name == CONTENT_ENCODING
        || *name == CONTENT_LENGTH
}

/// Copy recorded headers into a `HeaderMap`, skipping stripped headers and
/// anything that is not a valid header name or value.
pub fn replay_headers(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, field) in headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!("Skipping invalid recorded header name '{}'", name);
            continue;
        };
        if is_stripped(&name) {
            continue;
        }
        let values = match field {
            HeaderField::Single(v) => std::slice::from_ref(v),
            HeaderField::Multi(vs) => vs.as_slice(),
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.append(name.clone(), value);
                }
                Err(_) => debug!("Skipping invalid value for recorded header '{}'", name),
            }
        }
    }
    map
}

/// Extension trait for setting nightmock headers on responses.
pub trait NightmockHeadersExt {
    /// Insert a header with a static name and value.
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Insert only when the header is not already present.
    fn set_header_if_absent(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Permissive CORS headers, keeping any the response already carries.
    fn ensure_cors(&mut self) {
        self.set_header_if_absent(&ACCESS_CONTROL_ALLOW_ORIGIN, &VALUE_ANY);
        self.set_header_if_absent(&ACCESS_CONTROL_ALLOW_METHODS, &VALUE_CORS_METHODS);
        self.set_header_if_absent(&ACCESS_CONTROL_ALLOW_HEADERS, &VALUE_ANY);
    }

    /// Stamp the marker identifying responses not served by upstream.
    fn mark_mocked(&mut self) {
        self.set_header(&X_NIGHTMOCK, &VALUE_MOCK);
    }
}

impl<B> NightmockHeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }

    fn set_header_if_absent(&mut self, name: &HeaderName, value: &HeaderValue) {
        if !self.headers().contains_key(name) {
            self.headers_mut().insert(name.clone(), value.clone());
        }
    }
}
