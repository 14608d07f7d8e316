//! Operator warnings from the cache engine

use super::context::UiContext;
use super::output::{step, Status};
use crate::cache::Notifier;
use tracing::warn;

/// Shows engine warnings as CLI steps and records them in the log
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    ctx: UiContext,
}

impl ConsoleNotifier {
    pub fn new(ctx: &UiContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Notifier for ConsoleNotifier {
    fn warn(&self, message: &str) {
        warn!("{}", message);
        step(&self.ctx, Status::Warn, message, None);
    }
}
