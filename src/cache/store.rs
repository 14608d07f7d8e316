//! Persisted per-layer completion index (`.layer.index`)
//!
//! UTF-8 text, one release-relative path per line, no header. Files are
//! replaced atomically so a crash or cancellation never leaves a
//! half-written index behind.

use crate::error::{StrataError, StrataResult};
use crate::transport::temp_sibling;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Default index file name inside each layer directory
pub const DEFAULT_INDEX_FILE: &str = ".layer.index";

/// Reads and writes completion indexes below a release root
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
    file_name: String,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a layer's index file
    pub fn path_for(&self, layer: &str) -> PathBuf {
        self.root.join(layer).join(&self.file_name)
    }

    /// Read a layer's index; `None` when it has never been written
    pub async fn read(&self, layer: &str) -> StrataResult<Option<Vec<String>>> {
        let path = self.path_for(layer);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(parse_lines(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StrataError::io(format!("reading {}", path.display()), e)),
        }
    }

    /// Replace a layer's index with `paths`
    pub async fn write(&self, layer: &str, paths: &[String]) -> StrataResult<()> {
        let path = self.path_for(layer);
        let write_err = |source: std::io::Error| StrataError::IndexWrite {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut content = paths.join("\n");
        content.push('\n');

        let tmp = temp_sibling(&path);
        if let Err(e) = fs::write(&tmp, content).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        fs::rename(&tmp, &path).await.map_err(write_err)?;

        debug!("Wrote {} paths to {}", paths.len(), path.display());
        Ok(())
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_missing_index() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), DEFAULT_INDEX_FILE);
        assert!(store.read("base").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), DEFAULT_INDEX_FILE);
        let paths = vec![
            "base/directory.xml".to_string(),
            "base/lib/x.so".to_string(),
        ];

        store.write("base", &paths).await.unwrap();

        let on_disk = std::fs::read_to_string(temp.path().join("base/.layer.index")).unwrap();
        assert_eq!(on_disk, "base/directory.xml\nbase/lib/x.so\n");
        assert_eq!(store.read("base").await.unwrap().unwrap(), paths);
    }

    #[tokio::test]
    async fn rewrite_truncates() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path(), DEFAULT_INDEX_FILE);
        store
            .write("base", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        store.write("base", &["c".to_string()]).await.unwrap();
        assert_eq!(store.read("base").await.unwrap().unwrap(), vec!["c"]);

        // No temp files left behind
        let leftovers = std::fs::read_dir(temp.path().join("base"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".part")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn parse_skips_blank_lines() {
        assert_eq!(parse_lines("a\n\n  b \r\n"), vec!["a", "b"]);
    }
}
