use log::info;

use crate::error::{RelayError, Result, Stage};
use crate::host::HostApi;
use crate::providers::gitlab::CommitStatusUpdate;
use crate::status::HostStatus;

pub const DEFAULT_STATUS_NAME: &str = "Bitrise";
pub const DEFAULT_STATUS_DESCRIPTION: &str = "Build status reported by Bitrise";

/// Where and what to report for one commit.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport<'s> {
    pub project_path: &'s str,
    /// Numeric pipeline ID the status is attached to
    pub pipeline_id: &'s str,
    pub sha: &'s str,
    /// Status as text; only GitLab's commit status states are accepted
    pub status: &'s str,
    pub build_url: Option<&'s str>,
    pub ref_: Option<&'s str>,
}

/// Reports the upstream build result as a GitLab commit status.
pub struct Publisher<'a, H: HostApi + ?Sized> {
    host: &'a H,
    name: String,
    description: String,
}

impl<'a, H: HostApi + ?Sized> Publisher<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            name: DEFAULT_STATUS_NAME.to_string(),
            description: DEFAULT_STATUS_DESCRIPTION.to_string(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    /// Publishes `report.status` and returns the state that was sent.
    ///
    /// # Errors
    ///
    /// A configuration error, before any request, when the status is not a
    /// GitLab commit status state or the SHA is blank; otherwise the host error.
    pub async fn publish(&self, report: StatusReport<'_>) -> Result<HostStatus> {
        let state: HostStatus = report.status.parse()?;

        if report.sha.trim().is_empty() {
            return Err(RelayError::Configuration(
                "a commit SHA is required to publish a status".to_string(),
            ));
        }

        let update = CommitStatusUpdate {
            name: self.name.clone(),
            state,
            target_url: report
                .build_url
                .filter(|url| !url.trim().is_empty())
                .map(ToString::to_string),
            description: self.description.clone(),
            pipeline_id: report.pipeline_id.to_string(),
            ref_: report.ref_.map(ToString::to_string),
        };

        info!(
            "Publishing status '{state}' for {} (pipeline {})",
            report.sha, report.pipeline_id
        );

        self.host
            .update_commit_status(report.project_path, report.sha, &update)
            .await
            .map_err(RelayError::host(Stage::Publish))?;

        info!("Status published.");
        Ok(state)
    }
}
