//! Test fixtures: an on-disk remote mirror and a transport that records
//! every export it performs.

use crate::error::{StrataError, StrataResult};
use crate::transport::{ExportDepth, LocalTransport, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A remote repository laid out in a temp directory
pub struct Mirror {
    dir: TempDir,
}

impl Mirror {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URL of a path inside the mirror
    pub fn url(&self, relative: &str) -> String {
        let base = format!("file://{}", self.dir.path().display());
        if relative.is_empty() {
            base
        } else {
            format!("{}/{}", base, relative)
        }
    }

    pub fn file(&self, relative: &str, content: &str) -> &Self {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    /// Write a directory manifest with the given includes and one file group
    pub fn manifest(&self, relative: &str, includes: &[&str], files: &[&str]) -> &Self {
        self.file(relative, &manifest_xml(includes, files))
    }
}

pub fn manifest_xml(includes: &[&str], files: &[&str]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<Directory>\n  <Includes>\n");
    for include in includes {
        xml.push_str(&format!("    <Include FileName=\"{}\"/>\n", include));
    }
    xml.push_str("  </Includes>\n  <FileGroups>\n    <FileGroup>\n");
    for file in files {
        xml.push_str(&format!("      <File Name=\"{}\" />\n", file));
    }
    xml.push_str("    </FileGroup>\n  </FileGroups>\n</Directory>\n");
    xml
}

/// Wraps [`LocalTransport`], recording exports and optionally failing some
#[derive(Default)]
pub struct CountingTransport {
    inner: LocalTransport,
    exports: AtomicUsize,
    exported: Mutex<Vec<(String, ExportDepth)>>,
    fail_suffix: Mutex<Option<String>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
    offline: bool,
}

impl CountingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            offline: true,
            ..Self::default()
        })
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn exported(&self) -> Vec<(String, ExportDepth)> {
        self.exported.lock().clone()
    }

    /// Make exports of URLs ending in `suffix` fail
    pub fn fail_on(&self, suffix: &str) {
        *self.fail_suffix.lock() = Some(suffix.to_string());
    }

    /// Cancel `token` while exporting a URL ending in `suffix`
    pub fn cancel_on(&self, suffix: &str, token: &CancellationToken) {
        *self.cancel_on.lock() = Some((suffix.to_string(), token.clone()));
    }

    pub fn reset(&self) {
        self.exports.store(0, Ordering::SeqCst);
        self.exported.lock().clear();
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn check_connection(&self, url: &str) -> StrataResult<()> {
        if self.offline {
            return Err(StrataError::Connectivity {
                url: url.to_string(),
                reason: "network unreachable".to_string(),
            });
        }
        self.inner.check_connection(url).await
    }

    async fn export(&self, url: &str, dest: &Path, depth: ExportDepth) -> StrataResult<()> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        self.exported.lock().push((url.to_string(), depth));
        let failing = self.fail_suffix.lock().clone();
        if let Some(suffix) = failing {
            if url.ends_with(&suffix) {
                return Err(StrataError::transport(url, "injected failure"));
            }
        }
        let cancelling = self.cancel_on.lock().clone();
        if let Some((suffix, token)) = cancelling {
            if url.ends_with(&suffix) {
                token.cancel();
            }
        }
        self.inner.export(url, dest, depth).await
    }

    async fn read_to_string(&self, url: &str) -> StrataResult<String> {
        self.inner.read_to_string(url).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// A fresh, empty local cache root
pub fn cache_root() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("cache");
    std::fs::create_dir_all(&root).unwrap();
    (dir, root)
}
