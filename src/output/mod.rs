mod progress;
mod styling;

pub use progress::StepProgress;
pub use styling::{bright, dim, magenta_bold};

/// Prints the banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔁 pipeline-relay"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Bitrise → GitLab status and job relay")
    );
}

/// Prints a section title to stderr.
pub fn print_heading(title: &str) {
    eprintln!("{}", bright(title).underlined());
}
