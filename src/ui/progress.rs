//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::cache::ProgressSink;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU8, Ordering};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows immediately in interactive mode)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            // Plain output for CI
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            // Fallback if spinner wasn't started
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with warning message
    pub fn stop_warn(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            println!("{} {}", style("!").yellow(), message);
        } else {
            println!("{} {}", style("[WARN]").yellow(), message);
        }
    }
}

/// Progress of a cache rebuild.
///
/// Shows an indicatif bar per phase in interactive mode, and plain lines at
/// quarter steps in CI.
pub struct CacheProgress {
    bar: Option<ProgressBar>,
    last_reported: AtomicU8,
}

impl CacheProgress {
    pub fn new(ctx: &UiContext) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::hidden();
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos:>3}% {msg:.dim}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                    .progress_chars("━╸─"),
            );
            Some(bar)
        } else {
            None
        };
        Self {
            bar,
            last_reported: AtomicU8::new(0),
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for CacheProgress {
    fn phase(&self, label: &str) {
        self.last_reported.store(0, Ordering::Relaxed);
        match self.bar {
            Some(ref bar) => {
                bar.set_draw_target(ProgressDrawTarget::stderr());
                bar.reset();
                bar.set_length(100);
                bar.set_prefix(label.to_string());
                bar.set_message("");
                bar.enable_steady_tick(std::time::Duration::from_millis(120));
            }
            None => println!("{} {}", style("...").dim(), label),
        }
    }

    fn progress(&self, percent: u8, label: &str) {
        match self.bar {
            Some(ref bar) => {
                bar.set_position(u64::from(percent));
                bar.set_message(shorten(label, 50));
            }
            None => {
                let step = percent / 25 * 25;
                if step > self.last_reported.fetch_max(step, Ordering::Relaxed) {
                    println!("  {:>3}% {}", step, label);
                }
            }
        }
    }
}

/// Keep the tail of long paths, which is the informative part
fn shorten(label: &str, max: usize) -> String {
    let count = label.chars().count();
    if count <= max {
        return label.to_string();
    }
    let tail: String = label.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Testing...");
        spinner.stop("Done");
        // Should not panic
    }

    #[test]
    fn shorten_keeps_tail() {
        assert_eq!(shorten("app/x.so", 50), "app/x.so");
        let long = format!("{}/native.so", "a".repeat(60));
        let short = shorten(&long, 20);
        assert_eq!(short.chars().count(), 20);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("native.so"));
    }

    #[test]
    fn cache_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = CacheProgress::new(&ctx);
        progress.phase("Indexing layers");
        progress.phase("Loading missing files");
        progress.progress(10, "app/a.txt");
        progress.progress(50, "app/b.txt");
        progress.progress(100, "app/c.txt");
        progress.finish();
        assert_eq!(progress.last_reported.load(Ordering::Relaxed), 100);
    }
}
