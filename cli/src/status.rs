use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use wpm_core::TaskError;

/// Terminal rendering of the blocked operation: a spinner carrying the latest
/// hint, prefixed with the running-jobs summary.
///
/// With `enabled == false` every hint is printed as its own line instead.
#[derive(Clone)]
pub struct StatusDisplay {
    bar: ProgressBar,
    enabled: bool,
}

impl StatusDisplay {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                enabled: false,
            };
        }

        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{prefix}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.set_prefix("0 Jobs");
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar, enabled: true }
    }

    /// Status sink for the controller.
    pub fn show_hint(&self, hint: &str) {
        if self.enabled {
            self.bar.set_message(hint.to_string());
        } else {
            eprintln!("  {}", hint);
        }
    }

    /// Title sink for the job monitor.
    pub fn show_title(&self, title: &str) {
        if self.enabled {
            self.bar.set_prefix(title.to_string());
        }
    }

    pub fn finish(&self, title: &str, success: bool) {
        let icon = if success { "✅" } else { "❌" };
        if self.enabled {
            self.bar.finish_with_message(format!("{} {}", icon, title));
        } else {
            eprintln!("{} {}", icon, title);
        }
    }
}

/// Prints failures to stderr, above the spinner when one is active.
pub struct StderrInformUser {
    display: StatusDisplay,
}

impl StderrInformUser {
    pub fn new(display: StatusDisplay) -> Self {
        Self { display }
    }
}

impl wpm_core::InformUser for StderrInformUser {
    fn inform(&self, title: &str, error: &TaskError) {
        tracing::debug!(operation = %title, panic = error.is_panic(), "informing user");
        let line = format!("{} failed: {}", title, error);
        if self.display.enabled {
            self.display.bar.suspend(|| eprintln!("{}", line));
        } else {
            eprintln!("{}", line);
        }
    }
}
