//! Tracing setup with a log level the admin API can change at runtime.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Filter directive for a numeric `logLevel`: 0 warn, 1 info, 2 debug,
/// anything higher trace.
pub fn filter_directive(log_level: u8) -> &'static str {
    match log_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Swaps the global filter. The default handle is detached and does nothing,
/// which is what tests and embedders without a global subscriber get.
#[derive(Clone, Default)]
pub struct LogLevelHandle {
    inner: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogLevelHandle {
    pub fn set_level(&self, log_level: u8) -> Result<(), anyhow::Error> {
        if let Some(handle) = &self.inner {
            handle.reload(EnvFilter::new(filter_directive(log_level)))?;
        }
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, wins over
/// `log_level` until the level is changed through the admin API.
pub fn init(log_level: u8) -> LogLevelHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    LogLevelHandle {
        inner: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(0), "warn");
        assert_eq!(filter_directive(1), "info");
        assert_eq!(filter_directive(2), "debug");
        assert_eq!(filter_directive(9), "trace");
    }

    #[test]
    fn test_detached_handle_is_noop() {
        let handle = LogLevelHandle::default();
        assert!(!handle.is_attached());
        assert!(handle.set_level(3).is_ok());
    }

    #[test]
    fn test_set_level_reloads_filter() {
        let (layer, reload_handle) = reload::Layer::new(EnvFilter::new("warn"));
        let _subscriber = tracing_subscriber::registry().with(layer);
        let handle = LogLevelHandle {
            inner: Some(reload_handle.clone()),
        };

        handle.set_level(2).unwrap();
        let current = reload_handle.with_current(|f| f.to_string()).unwrap();
        assert!(current.contains("debug"));
    }
}
