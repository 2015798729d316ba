//! Shared state handed to every connection.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::client::{create_http_client, HttpClient};
use crate::config::{Config, RuntimeOverrides, SharedConfig};
use crate::logging::LogLevelHandle;
use crate::recording::{Persister, Recorder, VariantStore};
use crate::rules::{DecisionEngine, PresetStore};
use crate::selection::SelectionStore;

/// Everything the proxy and admin API need, built once at startup.
pub struct ProxyContext {
    pub config: SharedConfig,
    pub store: Arc<VariantStore>,
    pub selections: Arc<SelectionStore>,
    pub presets: PresetStore,
    pub engine: DecisionEngine,
    pub recorder: Recorder,
    pub persister: Arc<Persister>,
    pub http_client: HttpClient,
    pub log_level: LogLevelHandle,
    accepting: AtomicBool,
}

impl ProxyContext {
    /// Build the components for `config` without touching the snapshot file.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Arc<Self> {
        Self::with_shared(SharedConfig::new(config, config_path), LogLevelHandle::default())
    }

    fn with_shared(config: SharedConfig, log_level: LogLevelHandle) -> Arc<Self> {
        let effective = config.get();
        let store = Arc::new(VariantStore::new());
        let selections = Arc::new(SelectionStore::new(effective.selections_dir()));
        let persister = Persister::new(store.clone(), effective.snapshot_path());

        Arc::new(Self {
            engine: DecisionEngine::new(store.clone(), selections.clone()),
            recorder: Recorder::new(store.clone(), persister.clone()),
            config,
            store,
            selections,
            presets: PresetStore::new(effective.rules_dir()),
            persister,
            http_client: create_http_client(),
            log_level,
            accepting: AtomicBool::new(true),
        })
    }

    /// Build the components with command-line overrides applied and load
    /// the snapshot. A missing snapshot starts empty; an unreadable one is
    /// logged and also starts empty.
    pub fn from_config(
        config: Config,
        config_path: Option<PathBuf>,
        overrides: &RuntimeOverrides,
        log_level: LogLevelHandle,
    ) -> Arc<Self> {
        let shared = SharedConfig::with_overrides(config, config_path, overrides);
        let ctx = Self::with_shared(shared, log_level);
        let path = ctx.persister.path().to_path_buf();
        match ctx.store.load_from_file(&path) {
            Ok(count) => info!("Variant store ready with {} recordings", count),
            Err(e) => warn!(
                "Could not load {} ({}), starting with empty recordings",
                path.display(),
                e
            ),
        }
        ctx
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
        info!(
            "Proxy {} traffic",
            if accepting { "accepting" } else { "paused, rejecting" }
        );
    }
}
