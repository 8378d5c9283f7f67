//! Project configuration (`typhon.json`) reader.
//!
//! The pipeline only reads this record; its storage and merge semantics
//! belong to the surrounding tooling. The fields here are exactly what the
//! packager and runner consume.

use crate::error::{Result, TyphonError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the project configuration, relative to the project root.
pub const CONFIG_FILE: &str = "typhon.json";

/// Project configuration consumed by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub buildinfo: BuildInfo,

    #[serde(default)]
    pub build: BuildSection,

    /// Dependencies to embed in the package manifest (name -> version range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// The `buildinfo` section: package identity and packaging mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Project name, used as the cache/vendor namespace.
    pub name: String,

    /// Semantic version string.
    pub version: String,

    /// Package manager used to install dependencies ("npm", "yarn", "pnpm").
    /// Defaults to npm when absent.
    #[serde(rename = "packageManager", skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,

    /// Plugin projects are published through a package manager, never packaged.
    #[serde(default)]
    pub plugin: bool,
}

/// The `build` section: entry-point declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Entry point in dotted package notation (e.g. "com.example.Main.js").
    #[serde(default = "default_main")]
    pub main: String,
}

fn default_main() -> String {
    "index.js".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self { main: default_main() }
    }
}

impl ProjectConfig {
    /// Load the configuration from `<project_dir>/typhon.json`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| TyphonError::InvalidConfig {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| TyphonError::InvalidConfig {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{"buildinfo": {"name": "demo", "version": "0.0.1"}}"#,
        )
        .unwrap();

        assert_eq!(config.buildinfo.name, "demo");
        assert_eq!(config.buildinfo.version, "0.0.1");
        assert!(config.buildinfo.package_manager.is_none());
        assert!(!config.buildinfo.plugin);
        assert_eq!(config.build.main, "index.js");
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{
                "buildinfo": {
                    "name": "demo",
                    "version": "1.2.0",
                    "packageManager": "yarn",
                    "plugin": true
                },
                "build": {"main": "com.example.Main.js"},
                "dependencies": {"left-pad": "^1.3.0"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.buildinfo.package_manager.as_deref(), Some("yarn"));
        assert!(config.buildinfo.plugin);
        assert_eq!(config.build.main, "com.example.Main.js");
        assert_eq!(config.dependencies["left-pad"], "^1.3.0");
    }

    #[test]
    fn test_load_missing_config_fails() {
        let dir = std::env::temp_dir().join(format!("typhon-project-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let result = ProjectConfig::load(&dir);
        assert!(matches!(result, Err(TyphonError::InvalidConfig { .. })));

        let _ = std::fs::remove_dir_all(dir);
    }
}
