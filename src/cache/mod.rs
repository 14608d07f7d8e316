//! Layer cache consistency engine
//!
//! Keeps a release's layers mirrored below a local root. Each layer's
//! `.layer.index` lists every path the layer needs; a layer is complete
//! when its index exists and every listed path is present. Incomplete
//! layers are re-crawled from their remote manifests and only the missing
//! entries are loaded.
//!
//! | Stage | Module |
//! |-------|--------|
//! | Fast path | [`check`] |
//! | Single-flight | [`lock`] |
//! | Index | [`crawl`] |
//! | Load | [`gaps`] |
//! | Persist | [`store`] |

pub mod check;
pub mod crawl;
pub mod engine;
pub mod gaps;
pub mod lock;
pub mod pool;
pub mod report;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use check::{CompletenessChecker, LayerStatus};
pub use crawl::ManifestCrawler;
pub use engine::{AbortReason, CacheEngine, EnsureOutcome};
pub use gaps::GapLoader;
pub use lock::RebuildLocks;
pub use pool::WorkerPool;
pub use report::{LogNotifier, NoProgress, Notifier, ProgressSink};
pub use store::IndexStore;
