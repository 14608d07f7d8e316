//! Ensure command - make a layer's cache complete and run a command in it

use super::{create_engine, release_for};
use crate::cache::EnsureOutcome;
use crate::cli::args::EnsureArgs;
use crate::config::Config;
use crate::error::{StrataError, StrataResult};
use crate::task::{CommandTask, Task, TaskQueue};
use crate::ui::{self, CacheProgress, ConsoleNotifier, Status, UiContext};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Execute the ensure command
pub async fn execute(args: EnsureArgs, config: &Config, cancel: CancellationToken) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let release = release_for(config, &args.version)?;

    let queue = Arc::new(TaskQueue::start());
    let engine = create_engine(
        config,
        queue.clone(),
        Arc::new(ConsoleNotifier::new(&ctx)),
        cancel,
    )?;

    let mut tasks: Vec<Box<dyn Task>> = Vec::new();
    if !args.command.is_empty() {
        tasks.push(Box::new(CommandTask::new(args.command, release.local_root())?));
    }

    ui::banner(&ctx, &release.to_string(), &args.layer);
    debug!("Local root: {}", release.local_root().display());

    let progress = CacheProgress::new(&ctx);
    let outcome = engine
        .ensure_cache(&release, &args.layer, tasks, &progress)
        .await;
    progress.finish();

    match outcome {
        Ok(EnsureOutcome::Ready { rebuilt, exported }) => {
            ui::cache_summary(&ctx, rebuilt, exported);
        }
        Ok(EnsureOutcome::Aborted(_)) => {
            queue.drain().await?;
            ui::finish(&ctx, Status::Warn, "Layer cache not ready");
            return Err(StrataError::User(format!(
                "Layer cache for {} is not ready",
                args.layer
            )));
        }
        Ok(EnsureOutcome::Cancelled) => {
            queue.drain().await?;
            ui::finish(&ctx, Status::Warn, "Cancelled");
            return Err(StrataError::Cancelled);
        }
        Err(e) => {
            queue.drain().await?;
            ui::finish(&ctx, Status::Failed, "Layer cache rebuild failed");
            return Err(e);
        }
    }

    let report = queue.drain().await?;
    if let Some((name, reason)) = report.failed.into_iter().next() {
        return Err(StrataError::TaskFailed { name, reason });
    }

    ui::finish(&ctx, Status::Ok, "Layer cache ready");
    Ok(())
}
