//! Error types for Strata
//!
//! All modules use `StrataResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Strata operations
pub type StrataResult<T> = Result<T, StrataError>;

/// All errors that can occur in Strata
#[derive(Error, Debug)]
pub enum StrataError {
    // Repository errors
    #[error("Repository unreachable at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Unsupported export of {url}: {reason}")]
    ExportUnsupported { url: String, reason: String },

    // Layer errors
    #[error("Invalid layer name '{name}': {reason}")]
    LayerInvalid { name: String, reason: String },

    // Cache errors
    #[error("Failed to index {path}: {reason}")]
    Crawl { path: String, reason: String },

    #[error("Failed to load {path}")]
    GapFetch {
        path: String,
        #[source]
        source: Box<StrataError>,
    },

    #[error("Failed to write layer index {path}: {source}")]
    IndexWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Task errors
    #[error("Task '{name}' failed: {reason}")]
    TaskFailed { name: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StrataError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error for a remote URL
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a crawl error for a manifest path
    pub fn crawl(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Crawl {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::GapFetch { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Connectivity { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Connectivity { .. } => Some("Check repository.url in: strata config show"),
            Self::LayerInvalid { .. } => Some("Layer names use letters, digits, '.', '-' and '_'"),
            Self::GapFetch { .. } | Self::Crawl { .. } => {
                Some("Re-run the command; already loaded files are kept")
            }
            _ => None,
        }
    }
}
