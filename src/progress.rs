//! Progress display for installations

use indicatif::{ProgressBar, ProgressStyle};

use updraft::InstallState;

/// Spinner that follows the engine through its states
#[derive(Clone)]
pub struct InstallProgress {
    spinner: ProgressBar,
}

impl InstallProgress {
    /// Create a spinner for installing `package`
    pub fn new(package: &str, visible: bool) -> Self {
        if !visible {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {prefix} {msg}") {
            spinner.set_style(style.tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓",
            ]));
        }
        spinner.set_prefix(package.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));

        Self { spinner }
    }

    /// Update the message for a new engine state
    pub fn update(&self, state: InstallState) {
        let msg = match state {
            InstallState::Idle => "preparing",
            InstallState::Inspecting => "inspecting package",
            InstallState::Gating => "checking version",
            InstallState::Staging => "staging payload",
            InstallState::Committing => "swapping in new version",
            InstallState::Completed => {
                self.spinner.finish_and_clear();
                return;
            }
        };
        self.spinner.set_message(msg);
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.spinner.abandon();
    }
}
