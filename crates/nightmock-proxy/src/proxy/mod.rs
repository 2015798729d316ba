//! Proxy server module.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and main run loop
//! - `handler` - Request orchestration: decide, mock, forward, record, fall back
//! - `forwarding` - Request forwarding to the upstream target
//! - `tunnel` - CONNECT tunneling
//! - `mock` - Rendering mocked responses
//! - `client` - HTTP client creation
//! - `context` - Shared state for all connections

mod client;
mod context;
mod forwarding;
mod handler;
mod headers;
mod mock;
mod response_ext;
mod server;
mod tunnel;

pub use client::{create_http_client, HttpClient};
pub use context::ProxyContext;
pub use forwarding::{upstream_uri, ForwardError};
pub use handler::{handle_request, ADMIN_UI_PREFIX, API_PREFIX};
pub use headers::X_NIGHTMOCK;
pub use mock::mock_response;
pub use response_ext::{error_response, ProxyBody, ResponseExt};
pub use server::ProxyServer;
