//! Web links for pipelines and jobs, used in run reports.

use super::types::GlobalId;

/// Converts a pipeline ID to a clickable web URL.
///
/// # Arguments
///
/// * `base_url` - GitLab instance base URL (e.g., <https://gitlab.com>)
/// * `project_path` - Project path (e.g., "group/project")
/// * `id` - Pipeline ID (e.g., <gid://gitlab/Ci::Pipeline/123>)
///
/// # Returns
///
/// Clickable URL to the pipeline (e.g., <https://gitlab.com/group/project/-/pipelines/123>)
pub fn pipeline_url(base_url: &str, project_path: &str, id: &GlobalId) -> String {
    format!(
        "{}/{project_path}/-/pipelines/{}",
        base_url.trim_end_matches('/'),
        id.numeric
    )
}

/// Converts a job ID to a clickable web URL
/// (e.g., <https://gitlab.com/group/project/-/jobs/456>).
pub fn job_url(base_url: &str, project_path: &str, id: &GlobalId) -> String {
    format!(
        "{}/{project_path}/-/jobs/{}",
        base_url.trim_end_matches('/'),
        id.numeric
    )
}
