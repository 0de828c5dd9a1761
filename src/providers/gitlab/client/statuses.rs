use log::debug;
use serde::Serialize;

use super::core::{Effect, GitLabClient};
use crate::error::HostError;
use crate::status::HostStatus;

/// Form body of `POST /projects/:id/statuses/:sha`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitStatusUpdate {
    pub name: String,
    pub state: HostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub description: String,
    pub pipeline_id: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,
}

impl GitLabClient {
    /// Creates or updates the commit status for `sha`.
    pub async fn update_commit_status(
        &self,
        project_path: &str,
        sha: &str,
        update: &CommitStatusUpdate,
    ) -> Result<(), HostError> {
        let url = self
            .project_url(project_path)?
            .join(&format!("statuses/{}", urlencoding::encode(sha)))
            .map_err(|e| HostError::InvalidUrl(format!("status URL: {e}")))?;

        debug!("POST {url} (state {})", update.state);

        self.send(
            self.rest_request(url).form(update),
            Effect::Mutating("commit status update"),
        )
        .await?;

        Ok(())
    }
}
