//! Remote repository transports
//!
//! The cache engine only ever talks to the repository through the
//! [`Transport`] trait:
//! - `file://` URLs (or plain paths): a mirrored repository on disk
//! - `http://` / `https://` URLs: plain HTTP file serving

mod http;
mod local;

pub use http::HttpTransport;
pub use local::LocalTransport;

use crate::config::schema::RepositoryConfig;
use crate::error::{StrataError, StrataResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How much of a remote path an export brings over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDepth {
    /// Just the single file
    File,
    /// A directory with its immediate files, no subdirectories
    FilesOnly,
    /// A directory and everything below it
    Recursive,
}

/// Abstract repository transport
///
/// Implementations must be safe to call concurrently; the cache engine
/// bounds the number of outstanding calls itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check that the repository answers at `url`
    async fn check_connection(&self, url: &str) -> StrataResult<()>;

    /// Export the remote `url` into the local path `dest`
    async fn export(&self, url: &str, dest: &Path, depth: ExportDepth) -> StrataResult<()>;

    /// Read a small remote text document
    async fn read_to_string(&self, url: &str) -> StrataResult<String>;

    /// Whether [`ExportDepth::Recursive`] exports are supported
    fn lists_directories(&self) -> bool {
        true
    }

    /// Human-readable transport name for display
    fn name(&self) -> &'static str;
}

/// URL scheme families understood by [`create_transport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    File,
    Http,
}

impl Scheme {
    /// Detect the scheme of a repository URL; bare paths count as files
    pub fn detect(url: &str) -> StrataResult<Self> {
        match url.split_once("://") {
            None => Ok(Self::File),
            Some(("file", _)) => Ok(Self::File),
            Some(("http", _)) | Some(("https", _)) => Ok(Self::Http),
            Some((other, _)) => Err(StrataError::User(format!(
                "Unsupported repository scheme '{}' in {}. Use file://, http:// or https://",
                other, url
            ))),
        }
    }
}

/// Create the transport for the configured repository
pub fn create_transport(config: &RepositoryConfig) -> StrataResult<Arc<dyn Transport>> {
    match Scheme::detect(&config.url)? {
        Scheme::File => Ok(Arc::new(LocalTransport::new())),
        Scheme::Http => Ok(Arc::new(HttpTransport::new(Duration::from_secs(
            config.timeout_secs,
        )))),
    }
}

/// Everything before the last `/` of a URL
pub fn parent_url(url: &str) -> &str {
    match url.trim_end_matches('/').rfind('/') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// Append a relative, `/`-separated path to a URL
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Sibling temp path used for write-then-rename
pub(crate) fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detect() {
        assert_eq!(Scheme::detect("/srv/repo").unwrap(), Scheme::File);
        assert_eq!(Scheme::detect("file:///srv/repo").unwrap(), Scheme::File);
        assert_eq!(Scheme::detect("http://repo:8080/x").unwrap(), Scheme::Http);
        assert_eq!(Scheme::detect("https://repo/x").unwrap(), Scheme::Http);
        assert!(Scheme::detect("svn://repo/x").is_err());
    }

    #[test]
    fn parent_url_strips_last_segment() {
        assert_eq!(parent_url("http://r/base/directory.xml"), "http://r/base");
        assert_eq!(parent_url("http://r/base/"), "http://r");
        assert_eq!(parent_url("plain"), "plain");
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://r/base/", "/x.so"), "http://r/base/x.so");
        assert_eq!(join_url("http://r", "sub/a.txt"), "http://r/sub/a.txt");
    }

    #[test]
    fn temp_sibling_stays_in_directory() {
        let dest = Path::new("/cache/base/x.so");
        let tmp = temp_sibling(dest);
        assert_eq!(tmp.parent(), dest.parent());
        assert!(tmp.file_name().unwrap().to_string_lossy().starts_with(".x.so."));
    }

    #[test]
    fn create_transport_by_scheme() {
        let mut config = RepositoryConfig::default();
        config.url = "file:///srv/repo".to_string();
        assert_eq!(create_transport(&config).unwrap().name(), "file");

        config.url = "https://repo.example/dist".to_string();
        let transport = create_transport(&config).unwrap();
        assert_eq!(transport.name(), "http");
        assert!(!transport.lists_directories());
    }
}
