//! Layer index model
//!
//! An index maps release-relative paths (always `/`-separated) to the
//! entries that must be present locally, together with the remote URL
//! each entry is loaded from.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A unit of completeness tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEntry {
    /// A single file, loaded iff it exists
    File { path: String, remote_url: String },

    /// A directory whose listed members must all exist
    Dir {
        path: String,
        remote_url: String,
        includes: Vec<String>,
    },
}

impl IndexEntry {
    pub fn file(path: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            remote_url: remote_url.into(),
        }
    }

    /// A directory entry seeded with its first member
    pub fn dir(
        path: impl Into<String>,
        remote_url: impl Into<String>,
        first: impl Into<String>,
    ) -> Self {
        Self::Dir {
            path: path.into(),
            remote_url: remote_url.into(),
            includes: vec![first.into()],
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Dir { path, .. } => path,
        }
    }

    pub fn remote_url(&self) -> &str {
        match self {
            Self::File { remote_url, .. } | Self::Dir { remote_url, .. } => remote_url,
        }
    }

    /// Paths that must exist for this entry to count as loaded
    pub fn includes(&self) -> &[String] {
        match self {
            Self::File { path, .. } => std::slice::from_ref(path),
            Self::Dir { includes, .. } => includes,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir { .. })
    }

    /// Whether every include exists below `root`
    pub fn is_loaded(&self, root: &Path) -> bool {
        self.includes()
            .iter()
            .all(|include| local_path(root, include).exists())
    }

    /// Includes of this entry that are missing below `root`
    pub fn missing(&self, root: &Path) -> Vec<&str> {
        self.includes()
            .iter()
            .filter(|include| !local_path(root, include).exists())
            .map(String::as_str)
            .collect()
    }

    /// Fold another entry for the same path into this one.
    ///
    /// A file entry that meets a directory entry becomes the directory;
    /// two directories union their includes.
    fn absorb(&mut self, other: IndexEntry) {
        match (self.is_dir(), other) {
            (_, Self::File { .. }) => {}
            (false, dir) => *self = dir,
            (true, Self::Dir { includes: more, .. }) => {
                if let Self::Dir { includes, .. } = self {
                    for include in more {
                        if !includes.contains(&include) {
                            includes.push(include);
                        }
                    }
                }
            }
        }
    }
}

/// Map a release-relative, `/`-separated path onto the local filesystem
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Flat index of everything a layer needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl LayerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, merging with any entry already at the same path
    pub fn insert(&mut self, entry: IndexEntry) {
        match self.entries.entry(entry.path().to_string()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            btree_map::Entry::Occupied(mut slot) => slot.get_mut().absorb(entry),
        }
    }

    /// Merge every entry of `other` into this index
    pub fn merge(&mut self, other: LayerIndex) {
        for entry in other.entries.into_values() {
            self.insert(entry);
        }
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Entries that are not fully present below `root`
    pub fn unloaded<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.entries.values().filter(move |e| !e.is_loaded(root))
    }

    /// Every path the index requires, without duplicates
    pub fn flatten(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .flat_map(|e| e.includes().iter())
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect()
    }
}

impl FromIterator<IndexEntry> for LayerIndex {
    fn from_iter<T: IntoIterator<Item = IndexEntry>>(iter: T) -> Self {
        let mut index = Self::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}
