//! Configuration for shelf-views
//!
//! ```toml
//! builtins = true
//! apply_defaults = true
//! definition_paths = ["views", "extra/reading.toml"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Registry setup options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Register the built-in views
    pub builtins: bool,
    /// Definition files or directories to load, in order
    pub definition_paths: Vec<PathBuf>,
    /// Bind declared parameter defaults when compiling definitions
    pub apply_defaults: bool,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            builtins: true,
            definition_paths: Vec::new(),
            apply_defaults: true,
        }
    }
}

impl ViewsConfig {
    /// Load from a TOML file. Relative definition paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| LoadError::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(base) = path.parent() {
            for p in config.definition_paths.iter_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ViewsConfig::default();
        assert!(config.builtins);
        assert!(config.apply_defaults);
        assert!(config.definition_paths.is_empty());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, "builtins = false\ndefinition_paths = [\"views\", \"/abs/x.toml\"]\n").unwrap();

        let config = ViewsConfig::load(&path).unwrap();
        assert!(!config.builtins);
        assert!(config.apply_defaults);
        assert_eq!(config.definition_paths[0], dir.path().join("views"));
        assert_eq!(config.definition_paths[1], PathBuf::from("/abs/x.toml"));
    }

    #[test]
    fn bad_file_is_a_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, "builtins = \"yes\"\n").unwrap();
        assert!(matches!(ViewsConfig::load(&path), Err(LoadError::Toml { .. })));
    }
}
