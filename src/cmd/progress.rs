//! Status spinner shown on stderr while a remote call is in flight
//!
//! indicatif draws to stderr and stays hidden when stderr is not a terminal,
//! so stdout only ever carries the JSON document.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for a runbook call whose duration is unknown
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Finish with a green check
pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.green} {msg}", "✓", message);
}

pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.red} {msg}", "✗", message);
}

fn finish_with(spinner: &ProgressBar, template: &str, prefix: &'static str, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix);
    spinner.finish_with_message(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_finishes() {
        let spinner = create_spinner("Running UnlockUser...");
        assert!(!spinner.is_finished());
        finish_spinner_success(&spinner, "UnlockUser completed");
        assert!(spinner.is_finished());

        let spinner = create_spinner("Running SyncDirectory...");
        finish_spinner_error(&spinner, "SyncDirectory failed");
        assert!(spinner.is_finished());
    }
}
