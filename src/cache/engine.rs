//! Rebuild orchestration
//!
//! [`CacheEngine::ensure_cache`] makes sure every layer a top layer needs
//! is fully mirrored below the release's local root, then hands the
//! continuation tasks to the executor. The common case, an already
//! complete cache, never touches the network beyond a connectivity probe.

use super::check::CompletenessChecker;
use super::crawl::{ManifestCrawler, Seeds};
use super::gaps::GapLoader;
use super::lock::RebuildLocks;
use super::pool::WorkerPool;
use super::report::{LogNotifier, Notifier, ProgressSink};
use super::store::{IndexStore, DEFAULT_INDEX_FILE};
use crate::error::{StrataError, StrataResult};
use crate::layer::index::LayerIndex;
use crate::layer::resolve::LayerResolver;
use crate::release::Release;
use crate::task::{Task, TaskExecutor};
use crate::transport::{join_url, Transport};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Top manifest of every layer directory
pub const DEFAULT_MANIFEST_NAME: &str = "directory.xml";

/// Why a cache check gave up without failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A required layer could not be resolved
    UnresolvedLayer(String),
    /// The cache is incomplete and the repository cannot be reached
    Offline(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedLayer(name) => write!(f, "Layer '{}' could not be resolved", name),
            Self::Offline(reason) => write!(
                f,
                "Layer cache is incomplete and the repository is unreachable: {}",
                reason
            ),
        }
    }
}

/// Result of [`CacheEngine::ensure_cache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The cache is complete and continuations were queued
    Ready { rebuilt: bool, exported: usize },
    /// Nothing was changed; the operator has been warned
    Aborted(AbortReason),
    /// Cancelled before completion; no index was written
    Cancelled,
}

impl EnsureOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Keeps release caches complete
pub struct CacheEngine {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn LayerResolver>,
    executor: Arc<dyn TaskExecutor>,
    notifier: Arc<dyn Notifier>,
    pool: WorkerPool,
    locks: RebuildLocks,
    cancel: CancellationToken,
    index_file: String,
    manifest_name: String,
    export_retries: u32,
}

impl CacheEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn LayerResolver>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            transport,
            resolver,
            executor,
            notifier: Arc::new(LogNotifier),
            pool: WorkerPool::default(),
            locks: RebuildLocks::new(),
            cancel: CancellationToken::new(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            export_retries: 0,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share a worker pool with other engines
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Share rebuild locks with other engines
    pub fn with_locks(mut self, locks: RebuildLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Cancelling `token` stops any running check at its next suspension point
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn with_export_retries(mut self, retries: u32) -> Self {
        self.export_retries = retries;
        self
    }

    pub fn locks(&self) -> &RebuildLocks {
        &self.locks
    }

    /// Index store for a release
    pub fn store(&self, release: &Release) -> IndexStore {
        IndexStore::new(release.local_root(), &self.index_file)
    }

    /// Make sure `top_layer` and its base layers are fully mirrored, then
    /// queue `on_success` in order.
    ///
    /// Resolution problems and an unreachable repository are reported
    /// through the notifier and yield [`EnsureOutcome::Aborted`]. Crawl and
    /// load failures are errors. In neither case is a continuation queued
    /// or an index written.
    pub async fn ensure_cache(
        &self,
        release: &Release,
        top_layer: &str,
        on_success: Vec<Box<dyn Task>>,
        progress: &dyn ProgressSink,
    ) -> StrataResult<EnsureOutcome> {
        let outcome = match self.check_and_rebuild(release, top_layer, progress).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                info!("Cache check for {} cancelled", release);
                return Ok(EnsureOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        match &outcome {
            EnsureOutcome::Ready { .. } => {
                for task in on_success {
                    self.executor.enqueue(task)?;
                }
            }
            EnsureOutcome::Aborted(reason) => self.notifier.warn(&reason.to_string()),
            EnsureOutcome::Cancelled => {}
        }
        Ok(outcome)
    }

    async fn check_and_rebuild(
        &self,
        release: &Release,
        top_layer: &str,
        progress: &dyn ProgressSink,
    ) -> StrataResult<EnsureOutcome> {
        let remote = release.remote_url();
        let online = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StrataError::Cancelled),
            probe = self.transport.check_connection(&remote) => probe,
        };
        if let Err(e) = &online {
            debug!("Repository probe failed: {}", e);
        }

        let required = match self
            .resolver
            .resolve(release, top_layer, online.is_ok())
            .await
        {
            Ok(required) => required,
            Err(StrataError::LayerInvalid { name, reason }) => {
                debug!("Rejected layer name {}: {}", name, reason);
                return Ok(EnsureOutcome::Aborted(AbortReason::UnresolvedLayer(name)));
            }
            Err(e) => return Err(e),
        };
        if let Some(layer) = required.iter().find(|l| !l.is_resolved()) {
            return Ok(EnsureOutcome::Aborted(AbortReason::UnresolvedLayer(
                layer.name.clone(),
            )));
        }
        let layers: Vec<String> = required.into_iter().map(|l| l.name).collect();

        let checker = CompletenessChecker::new(self.store(release));
        if self.is_complete(&checker, &layers).await? {
            debug!("Cache for {} is complete", release);
            return Ok(ready(false, 0));
        }

        if let Err(e) = online {
            return Ok(EnsureOutcome::Aborted(AbortReason::Offline(e.to_string())));
        }

        let _guard = self.locks.acquire(&release.id(), &self.cancel).await?;
        if self.is_complete(&checker, &layers).await? {
            info!("Cache for {} was completed by another rebuild", release);
            return Ok(ready(false, 0));
        }

        let exported = self.rebuild(release, &layers, progress).await?;
        Ok(ready(true, exported))
    }

    /// Completeness check that gives way to cancellation
    async fn is_complete(
        &self,
        checker: &CompletenessChecker,
        layers: &[String],
    ) -> StrataResult<bool> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StrataError::Cancelled),
            complete = checker.is_complete(layers) => Ok(complete),
        }
    }

    /// Crawl every layer, load the union of gaps, then persist the indexes
    async fn rebuild(
        &self,
        release: &Release,
        layers: &[String],
        progress: &dyn ProgressSink,
    ) -> StrataResult<usize> {
        let root = release.local_root();
        let remote = release.remote_url();
        info!("Rebuilding cache for {} ({})", release, layers.join(", "));

        progress.phase("Indexing layers");
        let crawler = ManifestCrawler::new(
            Arc::clone(&self.transport),
            self.pool.clone(),
            &root,
            self.cancel.clone(),
        );
        let mut indexes = Vec::with_capacity(layers.len());
        for layer in layers {
            let seeds = Seeds::from([(
                format!("{}/{}", layer, self.manifest_name),
                join_url(&join_url(&remote, layer), &self.manifest_name),
            )]);
            indexes.push(crawler.crawl(seeds).await?);
        }

        let mut union = LayerIndex::new();
        for index in &indexes {
            union.merge(index.clone());
        }

        progress.phase("Loading missing files");
        let exported = GapLoader::new(
            Arc::clone(&self.transport),
            self.pool.clone(),
            &root,
            self.cancel.clone(),
        )
        .with_retries(self.export_retries)
        .fill(&union, progress)
        .await?;

        // Each index is replaced atomically; layers written before a
        // cancellation are complete on their own
        let store = self.store(release);
        for (layer, index) in layers.iter().zip(&indexes) {
            if self.cancel.is_cancelled() {
                return Err(StrataError::Cancelled);
            }
            store.write(layer, &index.flatten()).await?;
        }

        info!("Cache for {} complete, {} entries loaded", release, exported);
        Ok(exported)
    }
}

fn ready(rebuilt: bool, exported: usize) -> EnsureOutcome {
    EnsureOutcome::Ready { rebuilt, exported }
}
