use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::gitlab::links::{job_url, pipeline_url};
use crate::resolver::{ResolvedTarget, SelectionContext};
use crate::status::HostStatus;

/// What a run did, printed as JSON when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub project: String,
    pub selection: String,
    pub job: JobSummary,
    pub pipeline: PipelineSummary,
    /// Commit status sent to GitLab; absent for lookups without side effects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HostStatus>,
    pub triggered: bool,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub id: String,
    pub playable: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: String,
    pub iid: String,
    pub url: String,
}

impl RunReport {
    pub fn new(base_url: &str, ctx: &SelectionContext, target: &ResolvedTarget) -> Self {
        Self {
            project: ctx.project_path.clone(),
            selection: ctx.to_string(),
            job: JobSummary {
                name: target.job.name.clone(),
                id: target.job.id.gid.clone(),
                playable: target.job.playable,
                url: job_url(base_url, &ctx.project_path, &target.job.id),
            },
            pipeline: PipelineSummary {
                id: target.pipeline_id.gid.clone(),
                iid: target.pipeline_iid.clone(),
                url: pipeline_url(base_url, &ctx.project_path, &target.pipeline_id),
            },
            status: None,
            triggered: false,
            finished_at: Utc::now(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
