//! Release identity and path derivation
//!
//! A release is one published version of a repository. Its files live
//! remotely under `{repo_url}/releases/{version}` and are mirrored locally
//! under `{work_dir}/releases/{repo dir name}/{version}`.

use crate::error::{StrataError, StrataResult};
use crate::transport::join_url;
use std::path::{Path, PathBuf};

/// Directory below both the repository URL and the work dir holding releases
const RELEASES_DIR: &str = "releases";

/// One version of a repository, as a cache source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    repo_url: String,
    version: String,
    work_dir: PathBuf,
}

impl Release {
    pub fn new(
        repo_url: impl Into<String>,
        version: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> StrataResult<Self> {
        let repo_url = repo_url.into().trim_end_matches('/').to_string();
        let version = version.into();
        if repo_url.is_empty() {
            return Err(StrataError::User(
                "No repository configured. Pass --repo or set repository.url".to_string(),
            ));
        }
        validate_version(&version)?;
        Ok(Self {
            repo_url,
            version,
            work_dir: work_dir.into(),
        })
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Remote root of this release
    pub fn remote_url(&self) -> String {
        join_url(&join_url(&self.repo_url, RELEASES_DIR), &self.version)
    }

    /// Local root the release is mirrored into
    pub fn local_root(&self) -> PathBuf {
        self.work_dir
            .join(RELEASES_DIR)
            .join(url_to_dir_name(&self.repo_url))
            .join(&self.version)
    }

    /// Key identifying this release for single-flight rebuilds
    pub fn id(&self) -> String {
        self.local_root().to_string_lossy().into_owned()
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repo_url, self.version)
    }
}

/// Flatten a repository URL into a single directory name.
///
/// Drops the scheme and port, then turns path separators into dots:
/// `http://svn.host:8080/repo/x` becomes `svn.host.repo.x`.
pub fn url_to_dir_name(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let (host, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };

    format!("{}{}", host, path)
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn validate_version(version: &str) -> StrataResult<()> {
    let valid = !version.is_empty()
        && version != "."
        && version != ".."
        && !version.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StrataError::User(format!(
            "Invalid release version '{}'",
            version
        )))
    }
}
