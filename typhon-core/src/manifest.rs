//! Package manifest embedded in every `.typh` archive.
//!
//! The manifest is the contract between the packager and the runner: it is
//! written once at packaging time under a fixed entry name and read back
//! before extraction. It also owns the two path/version conventions the rest
//! of the pipeline leans on: the dotted entry-point notation and the
//! version-range normalization applied before dependencies reach the
//! installer.

use crate::error::{Result, TyphonError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Fixed archive entry name of the serialized manifest.
pub const MANIFEST_ENTRY_NAME: &str = "typhon.manifest.json";

/// Required extension of package archives (without the dot).
pub const ARCHIVE_EXTENSION: &str = "typh";

/// Package manager used to install a manifest's dependencies.
///
/// This is a closed set: a manifest carrying any other value fails to
/// deserialize, so the runner can never fall back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "npm" => Some(Self::Npm),
            "yarn" => Some(Self::Yarn),
            "pnpm" => Some(Self::Pnpm),
            _ => None,
        }
    }

    /// The installer binary name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build-info record embedded in every archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Project name, used as the cache/vendor namespace.
    pub name: String,

    /// Semantic version string.
    pub version: String,

    /// Entry file to execute after install, relative to the extracted root.
    pub main: String,

    /// Package manager used to install `deps`.
    pub pm: PackageManager,

    /// Dependencies to install before running (name -> version range).
    #[serde(default)]
    pub deps: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Serialize for the archive entry.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TyphonError::InvalidConfig {
            reason: format!("Failed to serialize manifest: {}", e),
        })
    }

    /// Read a manifest from an archive entry.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| TyphonError::InvalidConfig {
            reason: format!("Invalid package manifest: {}", e),
        })
    }
}

/// Convert a dotted entry-point declaration into a relative file path.
///
/// Only the directory portion is rewritten; the final dot-segment stays the
/// file name's extension, verbatim:
///
/// - `index.js` -> `index.js`
/// - `com.example.Main.js` -> `com/example/Main.js`
/// - `server` -> `server`
pub fn main_file_path(dotted: &str) -> PathBuf {
    let parts: Vec<&str> = dotted.split('.').collect();
    let Some((ext, stem)) = parts.split_last() else {
        return PathBuf::from(dotted);
    };
    if stem.is_empty() {
        return PathBuf::from(dotted);
    }

    let mut path = PathBuf::new();
    for segment in stem {
        path.push(segment);
    }
    path.set_extension(ext);
    path
}

/// Strip the leading range operator from a version range.
///
/// Installers receive exact/latest specifiers, not ranges: `^1.3.0`
/// becomes `1.3.0`, `>=2.0.0` becomes `2.0.0`.
pub fn bare_version(range: &str) -> &str {
    range.trim_start_matches(['^', '~', '>', '<', '=']).trim_start()
}

/// Format a dependency as the `name@version` form passed to the installer.
pub fn install_spec(name: &str, range: &str) -> String {
    format!("{}@{}", name, bare_version(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::MAIN_SEPARATOR;

    #[test]
    fn test_package_manager_parse() {
        assert!(matches!(PackageManager::parse("npm"), Some(PackageManager::Npm)));
        assert!(matches!(PackageManager::parse("NPM"), Some(PackageManager::Npm)));
        assert!(matches!(PackageManager::parse("yarn"), Some(PackageManager::Yarn)));
        assert!(matches!(PackageManager::parse("pnpm"), Some(PackageManager::Pnpm)));
        assert!(PackageManager::parse("bower").is_none());
        assert!(PackageManager::parse("").is_none());
    }

    #[test]
    fn test_unknown_package_manager_fails_deserialization() {
        let result: std::result::Result<PackageManifest, _> = serde_json::from_str(
            r#"{"name": "demo", "version": "0.0.1", "main": "index.js", "pm": "bower"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = PackageManifest {
            name: "demo".to_string(),
            version: "0.0.1".to_string(),
            main: "index.js".to_string(),
            pm: PackageManager::Npm,
            deps: [("left-pad".to_string(), "^1.3.0".to_string())].into(),
        };

        let json = manifest.to_json().unwrap();
        let parsed = PackageManifest::from_reader(json.as_slice()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_main_file_path_plain_file() {
        assert_eq!(main_file_path("index.js"), PathBuf::from("index.js"));
    }

    #[test]
    fn test_main_file_path_packaged() {
        let expected: PathBuf =
            format!("com{sep}example{sep}Main.js", sep = MAIN_SEPARATOR).into();
        assert_eq!(main_file_path("com.example.Main.js"), expected);
    }

    #[test]
    fn test_main_file_path_no_extension() {
        assert_eq!(main_file_path("server"), PathBuf::from("server"));
    }

    #[test]
    fn test_bare_version() {
        assert_eq!(bare_version("^1.3.0"), "1.3.0");
        assert_eq!(bare_version("~0.2.1"), "0.2.1");
        assert_eq!(bare_version(">=2.0.0"), "2.0.0");
        assert_eq!(bare_version("1.0.0"), "1.0.0");
        assert_eq!(bare_version("latest"), "latest");
    }

    #[test]
    fn test_install_spec() {
        assert_eq!(install_spec("left-pad", "^1.3.0"), "left-pad@1.3.0");
        assert_eq!(install_spec("lodash", "4.17.21"), "lodash@4.17.21");
    }
}
