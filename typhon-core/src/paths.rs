//! Centralized path configuration for Typhon.
//!
//! All data paths go through this module so the cache and vendor
//! directories stay consistent across commands.

use std::path::PathBuf;

/// Get the Typhon data directory.
///
/// Resolution order:
/// 1. `TYPHON_DATA_DIR` environment variable
/// 2. `~/.typhon`
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TYPHON_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().map(|h| h.join(".typhon")).unwrap_or_else(|| PathBuf::from(".typhon"))
}

/// Get the cache root (holds one subdirectory per extracted package).
pub fn cache_dir() -> PathBuf {
    data_dir().join("cache")
}

/// Get the shared vendor directory (installation target for all packages).
pub fn vendor_dir() -> PathBuf {
    data_dir().join("vendor")
}
