//! Configuration types for the nightmock proxy.

mod rules;
mod shared;

use std::path::{Path, PathBuf};

use anyhow::Context;
use hyper::Uri;
use serde::{Deserialize, Serialize};

pub use rules::{Rule, RuleAction};
pub use shared::SharedConfig;

/// File name of the variant store snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "recorded_data.json";
/// Directory holding one file per selection inside the data directory.
pub const SELECTIONS_DIR: &str = "selections";
/// Directory holding saved rule presets inside the data directory.
pub const RULES_DIR: &str = "rules";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Absolute base URL every proxied request is forwarded to
    pub target_url: String,

    /// Never contact upstream; serve only recorded data
    #[serde(default)]
    pub offline_mode: bool,

    /// Always fetch from upstream and record, including 5xx responses
    #[serde(default)]
    pub record_only_mode: bool,

    #[serde(default, rename = "skip5xx")]
    pub skip_5xx: bool,

    /// Console verbosity: 0 = warn, 1 = info, 2 = debug, 3+ = trace
    #[serde(default = "default_log_level")]
    pub log_level: u8,

    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Action applied when no rule matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<RuleAction>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Keys this proxy does not interpret (UI state and similar), kept so a
    /// config written back by the admin API loses nothing.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> u8 {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Config {
    /// Minimal config pointing at `target_url`, everything else defaulted.
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            port: default_port(),
            target_url: target_url.into(),
            offline_mode: false,
            record_only_mode: false,
            skip_5xx: false,
            log_level: default_log_level(),
            rules: Vec::new(),
            fallback: None,
            data_dir: default_data_dir(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = if is_yaml(path) {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("invalid YAML in {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("invalid JSON in {}", path.display()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Write the config back in the format implied by the file extension.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let path = path.as_ref();
        let contents = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.target_uri()?;
        Ok(())
    }

    /// Parsed `targetUrl`; must be an absolute http or https URI.
    pub fn target_uri(&self) -> Result<Uri, anyhow::Error> {
        let uri: Uri = self
            .target_url
            .parse()
            .with_context(|| format!("targetUrl '{}' is not a valid URL", self.target_url))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => anyhow::bail!(
                "Unsupported targetUrl scheme: '{other}'. Currently supported: http, https"
            ),
            None => anyhow::bail!("targetUrl '{}' must be an absolute URL", self.target_url),
        }
        if uri.authority().is_none() {
            anyhow::bail!("targetUrl '{}' has no host", self.target_url);
        }
        Ok(uri)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn selections_dir(&self) -> PathBuf {
        self.data_dir.join(SELECTIONS_DIR)
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.data_dir.join(RULES_DIR)
    }
}

/// Values given on the command line. They shape the running process only
/// and are never written back to the config file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
}

impl RuntimeOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
