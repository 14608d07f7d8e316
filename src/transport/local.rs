//! Transport for repositories mirrored on a local or mounted filesystem

use super::{temp_sibling, ExportDepth, Transport};
use crate::error::{StrataError, StrataResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Serves `file://` URLs and bare paths
#[derive(Debug, Clone, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a `file://` URL or bare path to a filesystem path
    pub fn to_path(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn check_connection(&self, url: &str) -> StrataResult<()> {
        let path = Self::to_path(url);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StrataError::Connectivity {
                url: url.to_string(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(StrataError::Connectivity {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn export(&self, url: &str, dest: &Path, depth: ExportDepth) -> StrataResult<()> {
        let src = Self::to_path(url);
        debug!("Exporting {} -> {} ({:?})", src.display(), dest.display(), depth);

        match depth {
            ExportDepth::File => copy_file(url, &src, dest).await,
            ExportDepth::FilesOnly => copy_dir(url, &src, dest, false).await,
            ExportDepth::Recursive => copy_dir(url, &src, dest, true).await,
        }
    }

    async fn read_to_string(&self, url: &str) -> StrataResult<String> {
        fs::read_to_string(Self::to_path(url))
            .await
            .map_err(|e| StrataError::transport(url, e))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Copy a single file through a temp sibling so readers never see a
/// partially written destination
async fn copy_file(url: &str, src: &Path, dest: &Path) -> StrataResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StrataError::io(format!("creating {}", parent.display()), e))?;
    }

    let tmp = temp_sibling(dest);
    if let Err(e) = fs::copy(src, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StrataError::transport(url, e));
    }
    fs::rename(&tmp, dest)
        .await
        .map_err(|e| StrataError::io(format!("moving {} into place", dest.display()), e))
}

/// Copy a directory's files, descending into subdirectories when `recursive`
async fn copy_dir(url: &str, src: &Path, dest: &Path, recursive: bool) -> StrataResult<()> {
    let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| StrataError::io(format!("creating {}", to.display()), e))?;

        let mut entries = fs::read_dir(&from)
            .await
            .map_err(|e| StrataError::transport(url, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StrataError::transport(url, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StrataError::transport(url, e))?;
            let target = to.join(entry.file_name());

            if file_type.is_dir() {
                if recursive {
                    pending.push((entry.path(), target));
                }
            } else {
                copy_file(url, &entry.path(), &target).await?;
            }
        }
    }

    Ok(())
}
