//! UI module for consistent, modern CLI experience
//!
//! Uses `cliclack` for spinners and intro/outro banners and `indicatif` for
//! rebuild progress, with automatic fallback to plain output in
//! CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata::ui::{self, CacheProgress, UiContext};
//!
//! let ctx = UiContext::detect();
//!
//! ui::banner(&ctx, &release.to_string(), "app");
//!
//! let progress = CacheProgress::new(&ctx);
//! engine.ensure_cache(&release, "app", tasks, &progress).await?;
//! progress.finish();
//!
//! ui::finish(&ctx, ui::Status::Ok, "Layer cache ready");
//! ```

mod context;
mod notify;
mod output;
mod progress;

pub use context::UiContext;
pub use notify::ConsoleNotifier;
pub use output::{
    banner, cache_summary, finish, heading, layer_definition, layer_row, missing_paths, step,
    Status,
};
pub use progress::{CacheProgress, TaskSpinner};
