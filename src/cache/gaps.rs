//! Gap loading: export exactly the index entries missing locally.

use super::pool::WorkerPool;
use super::report::{percent, ProgressSink};
use crate::error::{StrataError, StrataResult};
use crate::layer::index::{local_path, IndexEntry, LayerIndex};
use crate::transport::{join_url, ExportDepth, Transport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay before the first retry; grows linearly per attempt
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Fetches unloaded index entries through the shared pool
pub struct GapLoader {
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
    root: PathBuf,
    retries: u32,
    cancel: CancellationToken,
}

impl GapLoader {
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
            retries: 0,
            cancel,
        }
    }

    /// Retry each failing export up to `retries` extra times
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Export every entry of `index` that is not loaded yet.
    ///
    /// Returns the number of entries exported. The first entry that still
    /// fails after its retries aborts the whole fill.
    pub async fn fill(&self, index: &LayerIndex, progress: &dyn ProgressSink) -> StrataResult<usize> {
        let gaps: Vec<IndexEntry> = index.unloaded(&self.root).cloned().collect();
        let total = gaps.len();
        if total == 0 {
            debug!("No gaps below {}", self.root.display());
            return Ok(0);
        }
        info!("Loading {} missing entries", total);

        let mut units = JoinSet::new();
        for entry in gaps {
            if self.cancel.is_cancelled() {
                return Err(StrataError::Cancelled);
            }
            let transport = Arc::clone(&self.transport);
            let pool = self.pool.clone();
            let root = self.root.clone();
            let retries = self.retries;
            units.spawn(async move { load_entry(transport, pool, root, retries, entry).await });
        }

        let mut done = 0;
        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StrataError::Cancelled),
                joined = units.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let path = joined
                .map_err(|e| StrataError::Internal(format!("load task failed: {}", e)))??;
            done += 1;
            progress.progress(percent(done, total), &path);
        }

        Ok(done)
    }
}

async fn load_entry(
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
    root: PathBuf,
    retries: u32,
    entry: IndexEntry,
) -> StrataResult<String> {
    let _permit = pool.acquire().await?;
    let dest = local_path(&root, entry.path());
    debug!("Loading {}", entry.path());

    let result = match &entry {
        IndexEntry::File { remote_url, .. } => {
            export_with_retry(&*transport, remote_url, &dest, ExportDepth::File, retries).await
        }
        IndexEntry::Dir { remote_url, .. } if transport.lists_directories() => {
            export_with_retry(&*transport, remote_url, &dest, ExportDepth::Recursive, retries)
                .await
        }
        IndexEntry::Dir {
            path, remote_url, ..
        } => load_members(&*transport, &root, &entry, path, remote_url, retries).await,
    };

    match result {
        Ok(()) => Ok(entry.path().to_string()),
        Err(source) => Err(StrataError::GapFetch {
            path: entry.path().to_string(),
            source: Box::new(source),
        }),
    }
}

/// Export the missing members of a directory one file at a time
async fn load_members(
    transport: &dyn Transport,
    root: &Path,
    entry: &IndexEntry,
    dir: &str,
    remote_url: &str,
    retries: u32,
) -> StrataResult<()> {
    let prefix = format!("{}/", dir);
    for member in entry.missing(root) {
        let relative = member.strip_prefix(&prefix).unwrap_or(member);
        let url = join_url(remote_url, relative);
        let dest = local_path(root, member);
        export_with_retry(transport, &url, &dest, ExportDepth::File, retries).await?;
    }
    Ok(())
}

async fn export_with_retry(
    transport: &dyn Transport,
    url: &str,
    dest: &Path,
    depth: ExportDepth,
    retries: u32,
) -> StrataResult<()> {
    let mut attempt = 0;
    loop {
        match transport.export(url, dest, depth).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries && e.is_retryable() => {
                attempt += 1;
                warn!("Export of {} failed ({}), retry {}/{}", url, e, attempt, retries);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fixtures::{cache_root, CountingTransport, Mirror};
    use crate::cache::report::recording::Recorder;
    use crate::cache::report::NoProgress;

    fn loader(transport: Arc<CountingTransport>, root: &Path) -> GapLoader {
        GapLoader::new(transport, WorkerPool::new(3), root, CancellationToken::new())
    }

    fn scenario() -> (Mirror, LayerIndex) {
        let mirror = Mirror::new();
        mirror
            .manifest("root.xml", &["child.xml"], &[])
            .manifest("child.xml", &[], &["x.so"])
            .file("x.so", "elf");
        let index = ["root.xml", "child.xml", "x.so"]
            .into_iter()
            .map(|p| IndexEntry::file(p, mirror.url(p)))
            .collect();
        (mirror, index)
    }

    #[tokio::test]
    async fn fill_exports_only_the_gap() {
        let (mirror, index) = scenario();
        let (_tmp, root) = cache_root();
        std::fs::copy(mirror.path().join("root.xml"), root.join("root.xml")).unwrap();
        std::fs::copy(mirror.path().join("child.xml"), root.join("child.xml")).unwrap();
        let transport = CountingTransport::new();
        let recorder = Recorder::default();

        let exported = loader(Arc::clone(&transport), &root)
            .fill(&index, &recorder)
            .await
            .unwrap();

        assert_eq!(exported, 1);
        assert_eq!(transport.exports(), 1);
        assert_eq!(transport.exported()[0].0, mirror.url("x.so"));
        assert!(root.join("x.so").exists());
        assert_eq!(*recorder.ticks.lock(), vec![(100, "x.so".to_string())]);
    }

    #[tokio::test]
    async fn fill_on_complete_cache_is_noop() {
        let (mirror, index) = scenario();
        let (_tmp, root) = cache_root();
        for p in ["root.xml", "child.xml", "x.so"] {
            std::fs::copy(mirror.path().join(p), root.join(p)).unwrap();
        }
        let transport = CountingTransport::new();

        let exported = loader(Arc::clone(&transport), &root)
            .fill(&index, &NoProgress)
            .await
            .unwrap();
        assert_eq!(exported, 0);
        assert_eq!(transport.exports(), 0);
    }

    #[tokio::test]
    async fn directory_gap_exported_recursively() {
        let mirror = Mirror::new();
        mirror.file("base/sub/a.txt", "a").file("base/sub/b.txt", "b");
        let (_tmp, root) = cache_root();
        let mut index = LayerIndex::new();
        index.insert(IndexEntry::dir("base/sub", mirror.url("base/sub"), "base/sub/a.txt"));
        index.insert(IndexEntry::dir("base/sub", mirror.url("base/sub"), "base/sub/b.txt"));
        let transport = CountingTransport::new();

        loader(Arc::clone(&transport), &root)
            .fill(&index, &NoProgress)
            .await
            .unwrap();

        assert_eq!(
            transport.exported(),
            vec![(mirror.url("base/sub"), ExportDepth::Recursive)]
        );
        assert!(index.get("base/sub").unwrap().is_loaded(&root));
    }

    #[tokio::test]
    async fn failing_export_aborts_fill() {
        let (_mirror, index) = scenario();
        let (_tmp, root) = cache_root();
        let transport = CountingTransport::new();
        transport.fail_on("x.so");

        let err = loader(Arc::clone(&transport), &root)
            .fill(&index, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::GapFetch { ref path, .. } if path == "x.so"));
        assert!(!root.join("x.so").exists());
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (_mirror, index) = scenario();
        let (_tmp, root) = cache_root();
        std::fs::write(root.join("root.xml"), "x").unwrap();
        std::fs::write(root.join("child.xml"), "x").unwrap();
        let transport = CountingTransport::new();
        transport.fail_on("x.so");

        let err = loader(Arc::clone(&transport), &root)
            .with_retries(2)
            .fill(&index, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::GapFetch { .. }));
        assert_eq!(transport.exports(), 3);
    }

    #[tokio::test]
    async fn cancelled_fill_stops_before_exporting() {
        let (_mirror, index) = scenario();
        let (_tmp, root) = cache_root();
        let transport = CountingTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = GapLoader::new(transport.clone(), WorkerPool::new(1), &root, cancel)
            .fill(&index, &NoProgress)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.exports(), 0);
    }
}
