//! Named rule sets kept as `<dataDir>/rules/<name>.json` so operators can
//! switch between them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Rule, RuleAction};

const PRESET_EXTENSION: &str = ".json";

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Invalid preset name '{0}'")]
    InvalidName(String),

    #[error("Preset '{0}' not found")]
    NotFound(String),

    #[error("Preset I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preset is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A saved rule set with its fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePreset {
    pub rules: Vec<Rule>,
    #[serde(default = "default_fallback")]
    pub fallback: RuleAction,
}

fn default_fallback() -> RuleAction {
    RuleAction::ReturnMock
}

pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a preset; `.json` is appended unless present. Names
    /// that could leave the presets directory are rejected.
    pub fn file_name(name: &str) -> Result<String, PresetError> {
        if name.is_empty() || name.contains("..") || name.contains(['/', '\\']) {
            return Err(PresetError::InvalidName(name.to_string()));
        }
        if name.ends_with(PRESET_EXTENSION) {
            Ok(name.to_string())
        } else {
            Ok(format!("{name}{PRESET_EXTENSION}"))
        }
    }

    /// Write a preset, replacing any with the same name. Returns the file
    /// name used.
    pub fn save(&self, name: &str, preset: &RulePreset) -> Result<String, PresetError> {
        let file = Self::file_name(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(&file), serde_json::to_string_pretty(preset)?)?;
        info!("Saved rule preset {} ({} rules)", file, preset.rules.len());
        Ok(file)
    }

    /// Preset file names, sorted. A missing directory lists nothing.
    pub fn list(&self) -> Result<Vec<String>, PresetError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(PRESET_EXTENSION) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<RulePreset, PresetError> {
        let file = Self::file_name(name)?;
        let contents = match fs::read_to_string(self.dir.join(&file)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PresetError::NotFound(file));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), PresetError> {
        let file = Self::file_name(name)?;
        match fs::remove_file(self.dir.join(&file)) {
            Ok(()) => {
                info!("Deleted rule preset {}", file);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PresetError::NotFound(file)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset() -> RulePreset {
        RulePreset {
            rules: vec![Rule::new("GET /orders/*", RuleAction::ReturnMock)],
            fallback: RuleAction::PassOnly,
        }
    }

    #[test]
    fn test_file_name_rejects_traversal() {
        assert_eq!(PresetStore::file_name("night").unwrap(), "night.json");
        assert_eq!(PresetStore::file_name("night.json").unwrap(), "night.json");
        for bad in ["", "../etc", "a/b", r"a\b", "..json"] {
            assert!(matches!(
                PresetStore::file_name(bad),
                Err(PresetError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_save_list_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let presets = PresetStore::new(dir.path().join("rules"));
        assert!(presets.list().unwrap().is_empty());

        assert_eq!(presets.save("b", &preset()).unwrap(), "b.json");
        presets.save("a.json", &preset()).unwrap();
        fs::write(dir.path().join("rules").join("notes.txt"), "x").unwrap();
        assert_eq!(presets.list().unwrap(), vec!["a.json", "b.json"]);

        assert_eq!(presets.load("b").unwrap(), preset());
        presets.delete("b.json").unwrap();
        assert!(matches!(presets.load("b"), Err(PresetError::NotFound(_))));
        assert!(matches!(presets.delete("b"), Err(PresetError::NotFound(_))));
    }

    #[test]
    fn test_load_defaults_fallback_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let presets = PresetStore::new(dir.path());
        fs::write(
            dir.path().join("old.json"),
            r#"{"rules": [{"pattern": "/x", "action": "Pass Only"}]}"#,
        )
        .unwrap();
        let loaded = presets.load("old").unwrap();
        assert_eq!(loaded.fallback, RuleAction::ReturnMock);
        assert!(loaded.rules[0].enabled);

        fs::write(dir.path().join("bad.json"), "{nope").unwrap();
        assert!(matches!(presets.load("bad"), Err(PresetError::Parse(_))));
    }
}
