//! CLI command implementations

pub mod check;
pub mod config;
pub mod ensure;
pub mod layers;

pub use check::execute as check;
pub use config::execute as config;
pub use ensure::execute as ensure;
pub use layers::execute as layers;

use crate::cache::{CacheEngine, Notifier, WorkerPool};
use crate::config::Config;
use crate::error::StrataResult;
use crate::layer::ReleaseLayerResolver;
use crate::release::Release;
use crate::task::TaskExecutor;
use crate::transport::create_transport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Release of the configured repository
pub(crate) fn release_for(config: &Config, version: &str) -> StrataResult<Release> {
    Release::new(&config.repository.url, version, config.cache.work_dir())
}

/// Build a cache engine wired to the configured repository
pub(crate) fn create_engine(
    config: &Config,
    executor: Arc<dyn TaskExecutor>,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> StrataResult<CacheEngine> {
    let transport = create_transport(&config.repository)?;
    let resolver = Arc::new(ReleaseLayerResolver::new(Arc::clone(&transport)));

    Ok(CacheEngine::new(transport, resolver, executor)
        .with_notifier(notifier)
        .with_pool(WorkerPool::new(config.pool.width))
        .with_cancellation(cancel)
        .with_index_file(&config.cache.index_file)
        .with_manifest_name(&config.cache.manifest_name)
        .with_export_retries(config.pool.export_retries))
}
