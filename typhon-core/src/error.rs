//! Error types for Typhon.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Typhon operations.
pub type Result<T> = std::result::Result<T, TyphonError>;

/// Main error type for Typhon.
#[derive(Error, Debug)]
pub enum TyphonError {
    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Archive errors
    #[error("Archive error: {reason}")]
    Archive { reason: String },

    #[error("Failed to extract {archive:?}: {reason}")]
    ExtractionFailed { archive: PathBuf, reason: String },

    // Install errors
    #[error("{pm} install failed: {reason}")]
    InstallFailed { pm: String, reason: String },

    // Execution errors
    #[error("{file:?} exited with status {code}")]
    ExecutionFailed { file: PathBuf, code: i32 },

    // Plugin errors
    #[error("Plugin {plugin} failed: {reason}")]
    PluginFailed { plugin: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TyphonError {
    /// Create an `Io` error carrying the failing path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
