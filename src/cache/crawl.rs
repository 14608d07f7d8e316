//! Manifest crawling
//!
//! Builds a [`LayerIndex`] by walking a tree of directory manifests. The
//! walk is a worklist: every manifest is one visit spawned on a
//! `JoinSet`, each visit returns its own entries plus the nested manifests
//! it found, and the coordinating task merges results and spawns new
//! visits as old ones join. No visit ever waits for another one, so the
//! crawl cannot deadlock on the shared pool regardless of its width.

use super::pool::WorkerPool;
use crate::error::{StrataError, StrataResult};
use crate::layer::index::{local_path, IndexEntry, LayerIndex};
use crate::layer::manifest::{is_manifest_name, Manifest, ManifestError, Payload};
use crate::transport::{join_url, parent_url, ExportDepth, Transport};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Release-relative manifest path → remote manifest URL
pub type Seeds = BTreeMap<String, String>;

/// Result of visiting a single manifest
#[derive(Debug, Default)]
struct Visit {
    entries: LayerIndex,
    children: Vec<(String, String)>,
}

/// Crawls remote manifest trees into a flat index
pub struct ManifestCrawler {
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
    root: PathBuf,
    cancel: CancellationToken,
}

impl ManifestCrawler {
    pub fn new(
        transport: Arc<dyn Transport>,
        pool: WorkerPool,
        root: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            pool,
            root: root.into(),
            cancel,
        }
    }

    /// Crawl every manifest reachable from `seeds`.
    ///
    /// Manifests missing locally are exported first. The first failing
    /// visit aborts the remaining ones.
    pub async fn crawl(&self, seeds: Seeds) -> StrataResult<LayerIndex> {
        let mut index = LayerIndex::new();
        let mut seen = HashSet::new();
        let mut visits = JoinSet::new();

        for (path, url) in seeds {
            self.spawn_visit(&mut visits, &mut seen, path, url)?;
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StrataError::Cancelled),
                joined = visits.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let visit = joined
                .map_err(|e| StrataError::Internal(format!("crawl task failed: {}", e)))??;
            index.merge(visit.entries);
            for (path, url) in visit.children {
                self.spawn_visit(&mut visits, &mut seen, path, url)?;
            }
        }

        info!("Indexed {} entries from {} manifests", index.len(), seen.len());
        Ok(index)
    }

    fn spawn_visit(
        &self,
        visits: &mut JoinSet<StrataResult<Visit>>,
        seen: &mut HashSet<String>,
        path: String,
        url: String,
    ) -> StrataResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StrataError::Cancelled);
        }
        if !seen.insert(path.clone()) {
            return Ok(());
        }

        let transport = Arc::clone(&self.transport);
        let pool = self.pool.clone();
        let root = self.root.clone();
        visits.spawn(async move { visit(transport, pool, root, path, url).await });
        Ok(())
    }
}

async fn visit(
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
    root: PathBuf,
    path: String,
    url: String,
) -> StrataResult<Visit> {
    let _permit = pool.acquire().await?;
    let local = local_path(&root, &path);
    debug!("Visiting {}", path);

    // Bring siblings along so later existence checks see them
    if let Some(parent) = local.parent() {
        if !parent.exists() {
            transport
                .export(parent_url(&url), parent, ExportDepth::FilesOnly)
                .await
                .map_err(|e| StrataError::crawl(&path, e))?;
        }
    }
    if !local.exists() {
        transport
            .export(&url, &local, ExportDepth::File)
            .await
            .map_err(|e| StrataError::crawl(&path, e))?;
    }

    let mut visit = Visit::default();
    visit.entries.insert(IndexEntry::file(&path, &url));

    let manifest = match Manifest::from_file(&local).await {
        Ok(manifest) => manifest,
        Err(ManifestError::NotAManifest) => {
            debug!("{} is not a directory manifest", path);
            return Ok(visit);
        }
        Err(e) => return Err(StrataError::crawl(&path, e)),
    };

    let dir = parent_path(&path);
    let base_url = parent_url(&url);

    for include in manifest.includes.iter().filter(|i| is_manifest_name(i)) {
        visit
            .children
            .push((join_path(dir, include), join_url(base_url, include)));
    }

    for name in manifest.payloads() {
        match Payload::classify(name) {
            Payload::File(file) => {
                let relative = join_path(dir, file);
                let remote = join_url(base_url, file);
                // Sibling XML payloads may themselves be manifests
                if !file.contains('/') && is_manifest_name(file) {
                    visit.children.push((relative.clone(), remote.clone()));
                }
                visit.entries.insert(IndexEntry::file(relative, remote));
            }
            Payload::Nested { dir: sub, path: member } => {
                visit.entries.insert(IndexEntry::dir(
                    join_path(dir, sub),
                    join_url(base_url, sub),
                    join_path(dir, member),
                ));
            }
        }
    }

    Ok(visit)
}

/// Directory part of a release-relative path ("" at the root)
fn parent_path(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[..pos]).unwrap_or("")
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
