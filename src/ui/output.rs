//! Command output: cliclack framing on a terminal, tagged lines otherwise

use super::context::UiContext;
use console::{style, StyledObject};
use std::path::Path;

/// Missing paths listed per layer before the rest is summarized
pub const MISSING_SHOWN: usize = 5;

/// Outcome shown next to a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Failed,
}

impl Status {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Self::Ok => style("[OK]").green(),
            Self::Warn => style("[WARN]").yellow(),
            Self::Failed => style("[FAIL]").red(),
        }
    }

    fn paint(self, text: &str) -> StyledObject<&str> {
        match self {
            Self::Ok => style(text).green(),
            Self::Warn => style(text).yellow(),
            Self::Failed => style(text).red(),
        }
    }
}

/// Opening line of a cache run: `release / layer`
pub fn banner(ctx: &UiContext, release: &str, layer: &str) {
    let title = format!("{} / {}", release, layer);
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

/// Closing line of a cache run
pub fn finish(ctx: &UiContext, status: Status, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(status.paint(message).bold()).ok();
    } else {
        println!("{} {}", status.tag(), message);
    }
}

/// One step, with an optional dimmed detail
pub fn step(ctx: &UiContext, status: Status, message: &str, detail: Option<&str>) {
    let line = match detail {
        Some(detail) if ctx.use_fancy_output() => format!("{} ({})", message, style(detail).dim()),
        Some(detail) => format!("{} ({})", message, detail),
        None => message.to_string(),
    };

    if ctx.use_fancy_output() {
        let shown = match status {
            Status::Ok => cliclack::log::success(line),
            Status::Warn => cliclack::log::warning(line),
            Status::Failed => cliclack::log::error(line),
        };
        shown.ok();
    } else {
        println!("  {} {}", status.tag(), line);
    }
}

/// What `ensure` did to make the cache ready
pub fn cache_summary(ctx: &UiContext, rebuilt: bool, exported: usize) {
    if rebuilt {
        let detail = match exported {
            1 => "1 entry loaded".to_string(),
            n => format!("{} entries loaded", n),
        };
        step(ctx, Status::Ok, "Layer cache rebuilt", Some(&detail));
    } else {
        step(ctx, Status::Ok, "Layer cache is complete", None);
    }
}

/// Title above a list of layer rows
pub fn heading(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// `layer: status` row, colored by completeness
pub fn layer_row(ctx: &UiContext, layer: &str, status: &str, complete: bool) {
    let status_kind = if complete { Status::Ok } else { Status::Warn };
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(layer).dim(), status_kind.paint(status));
    } else {
        println!("  {} {}: {}", status_kind.tag(), layer, status);
    }
}

/// Row of a layer chain: where its definition lives, if it resolved
pub fn layer_definition(ctx: &UiContext, layer: &str, definition: Option<&Path>) {
    match definition {
        Some(path) => layer_row(ctx, layer, &path.display().to_string(), true),
        None => layer_row(ctx, layer, "unresolved", false),
    }
}

/// First [`MISSING_SHOWN`] missing paths of a layer, then a count of the rest
pub fn missing_paths(ctx: &UiContext, missing: &[String]) {
    let dim = |line: String| {
        if ctx.use_fancy_output() {
            cliclack::log::remark(line).ok();
        } else {
            println!("    {}", style(line).dim());
        }
    };

    for path in missing.iter().take(MISSING_SHOWN) {
        dim(format!("missing {}", path));
    }
    if missing.len() > MISSING_SHOWN {
        dim(format!("... and {} more", missing.len() - MISSING_SHOWN));
    }
}
