//! Live configuration shared between the proxy and the admin API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{Config, RuntimeOverrides};
use crate::rules::{compile_rules, CompiledRule};

struct Live {
    config: Arc<Config>,
    rules: Arc<Vec<CompiledRule>>,
}

/// The process-wide config plus its compiled rule set.
///
/// Readers take cheap `Arc` snapshots per request; writers swap both the
/// config and the rules under one write lock so a request never sees a rule
/// set compiled from a different config.
pub struct SharedConfig {
    live: RwLock<Live>,
    path: Option<PathBuf>,
    file_values: FileValues,
}

/// Fields as they were read from the config file, restored on persist.
struct FileValues {
    port: u16,
    data_dir: PathBuf,
}

impl SharedConfig {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self::with_overrides(config, path, &RuntimeOverrides::default())
    }

    /// Like [`SharedConfig::new`], with command-line values layered on top.
    /// The overridden fields keep their file values when persisted.
    pub fn with_overrides(
        mut config: Config,
        path: Option<PathBuf>,
        overrides: &RuntimeOverrides,
    ) -> Self {
        let file_values = FileValues {
            port: config.port,
            data_dir: config.data_dir.clone(),
        };
        overrides.apply(&mut config);
        let rules = Arc::new(compile_rules(&config.rules));
        Self {
            live: RwLock::new(Live {
                config: Arc::new(config),
                rules,
            }),
            path,
            file_values,
        }
    }

    pub fn get(&self) -> Arc<Config> {
        self.live.read().config.clone()
    }

    pub fn rules(&self) -> Arc<Vec<CompiledRule>> {
        self.live.read().rules.clone()
    }

    /// Config and rules read under a single lock acquisition.
    pub fn current(&self) -> (Arc<Config>, Arc<Vec<CompiledRule>>) {
        let live = self.live.read();
        (live.config.clone(), live.rules.clone())
    }

    /// Apply `f` to a copy of the config and publish it.
    pub fn update<F>(&self, f: F) -> Arc<Config>
    where
        F: FnOnce(&mut Config),
    {
        let mut live = self.live.write();
        let mut next = (*live.config).clone();
        f(&mut next);
        let rules_changed = next.rules != live.config.rules;
        if rules_changed {
            live.rules = Arc::new(compile_rules(&next.rules));
            info!("Applied {} rules", next.rules.len());
        }
        live.config = Arc::new(next);
        live.config.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the current config back to the file it was loaded from.
    pub fn persist(&self) -> Result<(), anyhow::Error> {
        match &self.path {
            Some(path) => {
                let mut on_disk = (*self.get()).clone();
                on_disk.port = self.file_values.port;
                on_disk.data_dir = self.file_values.data_dir.clone();
                on_disk.save_to_file(path)?;
                debug!("Config written to {}", path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Rule, RuleAction};

    #[test]
    fn test_update_is_visible_to_readers() {
        let shared = SharedConfig::new(Config::new("http://localhost:3000"), None);
        let before = shared.get();
        shared.update(|cfg| cfg.offline_mode = true);

        assert!(!before.offline_mode);
        assert!(shared.get().offline_mode);
    }

    #[test]
    fn test_update_recompiles_rules() {
        let shared = SharedConfig::new(Config::new("http://localhost:3000"), None);
        assert!(shared.rules().is_empty());

        shared.update(|cfg| {
            cfg.rules = vec![Rule::new("GET /orders/*", RuleAction::ReturnMock)];
        });
        let (config, rules) = shared.current();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].matches("GET", "/orders/7"));
    }

    #[test]
    fn test_persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let shared = SharedConfig::new(Config::new("http://localhost:3000"), Some(path.clone()));
        shared.update(|cfg| cfg.skip_5xx = true);
        shared.persist().unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.skip_5xx);
    }

    #[test]
    fn test_overrides_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let overrides = RuntimeOverrides {
            port: Some(9999),
            data_dir: Some(dir.path().join("elsewhere")),
        };
        let shared = SharedConfig::with_overrides(
            Config::new("http://localhost:3000"),
            Some(path.clone()),
            &overrides,
        );
        assert_eq!(shared.get().port, 9999);
        assert_eq!(shared.get().data_dir, dir.path().join("elsewhere"));

        shared.update(|cfg| cfg.offline_mode = true);
        shared.persist().unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.offline_mode);
        assert_eq!(reloaded.port, 8080);
        assert_eq!(reloaded.data_dir, PathBuf::from("./data"));
        assert_eq!(shared.get().port, 9999);
    }

    #[test]
    fn test_persist_without_path_is_noop() {
        let shared = SharedConfig::new(Config::new("http://localhost:3000"), None);
        assert!(shared.persist().is_ok());
        assert!(shared.path().is_none());
    }
}
