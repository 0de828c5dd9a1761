use std::sync::OnceLock;

use regex_lite::Regex;

fn remote_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // scheme://host/<path>[.git][/]  or  user@host:<path>[.git][/]
        Regex::new(r"(?:://[^/]+?/|[^:/]+?:)([^/]+?/.+?)(?:\.git)?/?$")
            .expect("remote URL pattern is valid")
    })
}

/// Extracts the `group/project` path from a git remote URL.
///
/// Handles HTTPS and SSH remotes (`https://gitlab.com/group/project.git`,
/// `git@gitlab.com:group/sub/project.git`). Returns `None` when the URL has
/// no namespace/project part.
pub fn project_path_from_repository_url(url: &str) -> Option<String> {
    remote_pattern()
        .captures(url.trim())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
