// Library exports for the binary and the integration tests

pub mod admin_api;
pub mod config;
pub mod fingerprint;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod recording;
pub mod rules;
pub mod selection;
