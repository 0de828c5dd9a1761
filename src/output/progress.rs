use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_red, bright_yellow};

/// Spinner for one step of a run (resolve, publish, trigger).
///
/// Hidden steps draw nothing, so library callers and tests get no terminal
/// output.
pub struct StepProgress {
    pb: ProgressBar,
}

impl StepProgress {
    pub fn start(visible: bool, message: impl std::fmt::Display) -> Self {
        let pb = ProgressBar::new_spinner();
        if visible {
            pb.set_draw_target(ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
        } else {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_message(bright_yellow(message).to_string());
        Self { pb }
    }

    pub fn succeed(self, message: impl std::fmt::Display) {
        self.pb
            .finish_with_message(bright_green(format!("{message} ✓")).to_string());
    }

    pub fn fail(self, message: impl std::fmt::Display) {
        self.pb
            .abandon_with_message(bright_red(format!("{message} ✗")).to_string());
    }
}
