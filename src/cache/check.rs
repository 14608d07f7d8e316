//! Network-free completeness check over persisted layer indexes

use super::store::IndexStore;
use crate::layer::index::local_path;
use std::fmt;
use tracing::debug;

/// Local state of one layer's cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    /// Index present and every listed path exists
    Complete { paths: usize },
    /// Index present but some listed paths are gone
    Incomplete { missing: Vec<String> },
    /// No index has been written yet
    NotIndexed,
    /// The index exists but cannot be used
    Unreadable(String),
}

impl LayerStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { paths } => write!(f, "complete ({} paths)", paths),
            Self::Incomplete { missing } => write!(f, "incomplete ({} missing)", missing.len()),
            Self::NotIndexed => write!(f, "not indexed"),
            Self::Unreadable(reason) => write!(f, "unreadable index: {}", reason),
        }
    }
}

/// Verifies layers against their `.layer.index` files
#[derive(Debug, Clone)]
pub struct CompletenessChecker {
    store: IndexStore,
}

impl CompletenessChecker {
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }

    /// True iff every layer has a usable index whose paths all exist
    pub async fn is_complete(&self, layers: &[String]) -> bool {
        for layer in layers {
            let status = self.status(layer).await;
            if !status.is_complete() {
                debug!("Layer {} is {}", layer, status);
                return false;
            }
        }
        true
    }

    /// Inspect a single layer
    pub async fn status(&self, layer: &str) -> LayerStatus {
        let paths = match self.store.read(layer).await {
            Ok(Some(paths)) => paths,
            Ok(None) => return LayerStatus::NotIndexed,
            Err(e) => return LayerStatus::Unreadable(e.to_string()),
        };
        if paths.is_empty() {
            return LayerStatus::Unreadable("index lists no paths".to_string());
        }

        let mut missing = Vec::new();
        for path in &paths {
            let local = local_path(self.store.root(), path);
            if !tokio::fs::try_exists(&local).await.unwrap_or(false) {
                missing.push(path.clone());
            }
        }

        if missing.is_empty() {
            LayerStatus::Complete { paths: paths.len() }
        } else {
            LayerStatus::Incomplete { missing }
        }
    }
}
