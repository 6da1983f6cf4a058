use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Detect if we're running in a CI environment
fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "JENKINS_URL"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Creates a spinner for a discovery run.
///
/// The spinner is hidden when progress is disabled or in CI, so callers can
/// update it unconditionally.
pub fn spinner(message: &str, enabled: bool) -> ProgressBar {
    if !enabled || is_ci() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
