//! Configuration document and format-agnostic loading

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Target, TaskConfig};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl Config {
    /// Load a configuration file; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        ConfigStore::new().load(path)
    }

    /// Validate every task and the set-wide invariants.
    ///
    /// Names and paths must be unique across the whole document. Nothing
    /// touches the network or the target paths.
    pub fn validate(&self) -> Result<Vec<Target>> {
        let mut names = HashSet::with_capacity(self.tasks.len());
        let mut paths = HashSet::with_capacity(self.tasks.len());
        let mut targets = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let target = task.validate()?;

            if !names.insert(target.name().to_string()) {
                return Err(Error::NameNotUnique {
                    name: target.name().to_string(),
                });
            }
            if !paths.insert(target.path().to_path_buf()) {
                return Err(Error::PathNotUnique {
                    task: target.name().to_string(),
                    path: target.path().to_path_buf(),
                });
            }

            targets.push(target);
        }

        Ok(targets)
    }
}

/// Load and validate a configuration file in one step.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let config = Config::load(path)?;
    let targets = config.validate()?;
    tracing::debug!(path = %path.display(), tasks = targets.len(), "configuration loaded");
    Ok(targets)
}

/// Format-agnostic configuration loader.
///
/// The format is detected from the file extension:
/// - `.yaml`, `.yml` -> YAML
/// - `.json` -> JSON
/// - `.toml` -> TOML
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Read and deserialize a configuration file.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !matches!(extension.as_str(), "yaml" | "yml" | "json" | "toml") {
            return Err(Error::UnsupportedFormat { extension });
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.parse(path, &extension, &content)
    }

    fn parse<T: DeserializeOwned>(&self, path: &Path, extension: &str, content: &str) -> Result<T> {
        let parse_error = |format: &str, message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        };

        match extension {
            "yaml" | "yml" => {
                serde_yaml::from_str(content).map_err(|e| parse_error("YAML", e.to_string()))
            }
            "json" => serde_json::from_str(content).map_err(|e| parse_error("JSON", e.to_string())),
            "toml" => toml::from_str(content).map_err(|e| parse_error("TOML", e.to_string())),
            other => Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }
}
