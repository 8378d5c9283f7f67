//! Shared vendor directory for installed dependencies.
//!
//! All packages on a machine install into one vendor directory; its
//! `package.json` accumulates dependency entries across runs and is never
//! pruned. Mutation goes through `&mut self`, so a single process has a
//! single writer. Concurrent processes can still interleave manifest
//! rewrites; that race is a documented constraint of the shared-vendor
//! design, not something this module locks against.

use crate::error::{Result, TyphonError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the vendor manifest inside the vendor directory.
pub const VENDOR_MANIFEST: &str = "package.json";

/// The accumulated installation manifest shared by all packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Default for VendorManifest {
    fn default() -> Self {
        Self {
            name: "typhon-vendor".to_string(),
            version: "0.0.0".to_string(),
            dependencies: BTreeMap::new(),
        }
    }
}

/// Owns the vendor directory and its manifest.
#[derive(Debug)]
pub struct VendorStore {
    dir: PathBuf,
}

impl VendorStore {
    /// Open the store at the default vendor directory.
    pub fn open() -> Self {
        Self::with_dir(paths::vendor_dir())
    }

    /// Open the store at a custom directory.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The vendor directory (passed to installers as the prefix).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The module-resolution path injected into executed packages.
    pub fn node_modules_path(&self) -> PathBuf {
        self.dir.join("node_modules")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(VENDOR_MANIFEST)
    }

    /// Create the vendor directory and a fresh manifest if absent.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| TyphonError::io(&self.dir, e))?;

        let path = self.manifest_path();
        if !path.exists() {
            self.save_manifest(&VendorManifest::default())?;
        }
        Ok(())
    }

    /// Load the accumulated manifest.
    pub fn load_manifest(&self) -> Result<VendorManifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(VendorManifest::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| TyphonError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| TyphonError::InvalidConfig {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Merge a package's dependency map into the vendor manifest.
    ///
    /// Re-adding a name overwrites its version range; entries are never
    /// removed.
    pub fn record_dependencies(&mut self, deps: &BTreeMap<String, String>) -> Result<()> {
        self.ensure()?;

        let mut manifest = self.load_manifest()?;
        for (name, range) in deps {
            manifest.dependencies.insert(name.clone(), range.clone());
        }
        self.save_manifest(&manifest)?;

        debug!(count = deps.len(), total = manifest.dependencies.len(), "vendor manifest updated");
        Ok(())
    }

    fn save_manifest(&self, manifest: &VendorManifest) -> Result<()> {
        let path = self.manifest_path();
        let content = serde_json::to_string_pretty(manifest).map_err(|e| {
            TyphonError::InvalidConfig { reason: format!("Failed to serialize vendor manifest: {}", e) }
        })?;
        fs::write(&path, content).map_err(|e| TyphonError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("typhon-vendor-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_ensure_creates_manifest() {
        let dir = temp_dir();
        let store = VendorStore::with_dir(dir.clone());

        store.ensure().unwrap();
        assert!(dir.join(VENDOR_MANIFEST).is_file());

        let manifest = store.load_manifest().unwrap();
        assert_eq!(manifest.name, "typhon-vendor");
        assert!(manifest.dependencies.is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_record_dependencies_accumulates() {
        let dir = temp_dir();
        let mut store = VendorStore::with_dir(dir.clone());

        store
            .record_dependencies(&[("left-pad".to_string(), "^1.3.0".to_string())].into())
            .unwrap();
        store
            .record_dependencies(&[("lodash".to_string(), "4.17.21".to_string())].into())
            .unwrap();

        let manifest = store.load_manifest().unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies["left-pad"], "^1.3.0");
        assert_eq!(manifest.dependencies["lodash"], "4.17.21");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_record_dependencies_overwrites_range() {
        let dir = temp_dir();
        let mut store = VendorStore::with_dir(dir.clone());

        store
            .record_dependencies(&[("left-pad".to_string(), "^1.3.0".to_string())].into())
            .unwrap();
        store
            .record_dependencies(&[("left-pad".to_string(), "^2.0.0".to_string())].into())
            .unwrap();

        let manifest = store.load_manifest().unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(manifest.dependencies["left-pad"], "^2.0.0");

        let _ = fs::remove_dir_all(dir);
    }
}
