//! Directory manifest parsing
//!
//! Every directory published in a release carries a manifest (usually
//! `directory.xml`) that lists nested manifests and the payload files of
//! the directory:
//!
//! ```xml
//! <Directory Name="base">
//!   <Includes>
//!     <Include FileName="tools/directory.xml"/>
//!   </Includes>
//!   <FileGroups>
//!     <FileGroup Type="binary">
//!       <File Name="start.sh" />
//!       <File Name="lib/native.so" />
//!     </FileGroup>
//!   </FileGroups>
//! </Directory>
//! ```
//!
//! Only the attributes the cache engine needs are read; everything else in
//! the document is ignored.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Suffix shared by every manifest file name
pub const MANIFEST_SUFFIX: &str = ".xml";

/// Extensions of payloads that are tracked as standalone files even when
/// they live below a nested directory
pub const BINARY_EXTENSIONS: &[&str] = &["so", "dll", "exe", "dylib", "jar", "bin"];

static DIRECTORY_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Directory\b").expect("valid regex"));
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<Include\b[^>]*?\bFileName\s*=\s*"([^"]*)""#).expect("valid regex")
});
static FILE_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<FileGroup\b[^>]*>(.*?)</FileGroup>").expect("valid regex")
});
static FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<File\b[^>]*?\bName\s*=\s*"([^"]*)""#).expect("valid regex")
});

/// Errors raised while reading a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The document is readable but is not a directory manifest
    #[error("not a directory manifest")]
    NotAManifest,

    #[error("malformed manifest: {0}")]
    Malformed(String),

    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed directory manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Nested manifests, relative to this manifest's directory
    pub includes: Vec<String>,

    /// Payload listings
    pub file_groups: Vec<FileGroup>,
}

/// One `<FileGroup>` of payload file names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGroup {
    pub files: Vec<String>,
}

/// How a payload name is tracked in the layer index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Tracked on its own
    File(&'a str),

    /// Tracked as a member of the directory `dir`
    Nested { dir: &'a str, path: &'a str },
}

impl<'a> Payload<'a> {
    /// Classify a payload name from a file group
    pub fn classify(name: &'a str) -> Self {
        match name.split_once('/') {
            None => Self::File(name),
            Some(_) if has_binary_extension(name) => Self::File(name),
            Some((dir, _)) => Self::Nested { dir, path: name },
        }
    }
}

/// Whether `name` ends in one of [`BINARY_EXTENSIONS`]
pub fn has_binary_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Whether `name` looks like a manifest file
pub fn is_manifest_name(name: &str) -> bool {
    name.ends_with(MANIFEST_SUFFIX)
}

impl Manifest {
    /// Parse a manifest from a file on disk
    pub async fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let bytes = tokio::fs::read(path).await?;
        match String::from_utf8(bytes) {
            Ok(content) => Self::parse(&content),
            // Binary payloads that happen to end in .xml
            Err(_) => Err(ManifestError::NotAManifest),
        }
    }

    /// Parse a manifest from its XML text
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        if !DIRECTORY_ROOT.is_match(content) {
            return Err(ManifestError::NotAManifest);
        }

        let includes = INCLUDE
            .captures_iter(content)
            .map(|c| relative_name(&c[1], "Include FileName"))
            .collect::<Result<Vec<_>, _>>()?;

        let file_groups = FILE_GROUP
            .captures_iter(content)
            .map(|group| {
                FILE.captures_iter(&group[1])
                    .map(|c| relative_name(&c[1], "File Name"))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|files| FileGroup { files })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            includes,
            file_groups,
        })
    }

    /// All payload names across every file group
    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.file_groups
            .iter()
            .flat_map(|g| g.files.iter().map(String::as_str))
    }
}

/// Read a name attribute as a path relative to the manifest's directory.
///
/// Names are `/`-separated and may not leave that directory: absolute
/// names, `.`/`..` segments, empty segments, backslashes and NUL are
/// rejected.
fn relative_name(value: &str, attribute: &str) -> Result<String, ManifestError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ManifestError::Malformed(format!("empty {} attribute", attribute)));
    }

    let name = value.trim_start_matches("./");
    let valid = !name.starts_with('/')
        && !name.contains(['\\', '\0'])
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if !valid {
        return Err(ManifestError::Malformed(format!(
            "{} '{}' is not a relative path",
            attribute, value
        )));
    }
    Ok(name.to_string())
}
