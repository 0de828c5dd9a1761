use graphql_client::GraphQLQuery;
use log::debug;

use super::core::{Effect, GitLabClient};
use crate::error::HostError;
use crate::providers::gitlab::types::{GlobalId, Job, JobStatus, Pipeline, PipelineGraph};
use crate::resolver::{Locator, SelectionContext};

pub type CiPipelineID = String;
pub type JobID = String;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "src/providers/gitlab/client/schema.graphql",
    query_path = "src/providers/gitlab/client/pipelines.graphql",
    response_derives = "Debug,PartialEq,Clone"
)]
pub struct FetchProjectPipelines;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "src/providers/gitlab/client/schema.graphql",
    query_path = "src/providers/gitlab/client/pipelines.graphql",
    query_name = "FetchMergeRequestPipelines",
    response_derives = "Debug,PartialEq,Clone"
)]
pub struct FetchMergeRequestPipelines;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "src/providers/gitlab/client/schema.graphql",
    query_path = "src/providers/gitlab/client/pipelines.graphql",
    query_name = "FetchBranchMergeRequestPipelines",
    response_derives = "Debug,PartialEq,Clone"
)]
pub struct FetchBranchMergeRequestPipelines;

/// Converts a generated pipeline node into a [`Pipeline`].
///
/// Every query selects the same pipeline fields, but graphql_client emits a
/// distinct struct per query, so the conversion is shared as a macro. Jobs
/// GitLab returns without an ID or name cannot be acted on and are dropped.
macro_rules! decode_pipeline {
    ($node:expr) => {{
        let node = $node;
        let mut jobs = Vec::new();
        for job in node
            .jobs
            .into_iter()
            .flat_map(|conn| conn.nodes)
            .flatten()
            .flatten()
        {
            let (Some(id), Some(name)) = (job.id, job.name) else {
                continue;
            };
            jobs.push(Job {
                id: GlobalId::parse(&id)?,
                name,
                status: job.status.map_or(JobStatus::Unknown, JobStatus::from),
                playable: job.can_play_job,
            });
        }
        Pipeline {
            id: GlobalId::parse(&node.id)?,
            iid: node.iid,
            jobs,
        }
    }};
}

/// Maps each query's generated `CiJobStatus` onto [`JobStatus`]. Values
/// newer than the bundled schema land in `Other` and become `Unknown`.
macro_rules! job_status_from {
    ($($query:ident),+ $(,)?) => {$(
        impl From<$query::CiJobStatus> for JobStatus {
            fn from(status: $query::CiJobStatus) -> Self {
                use $query::CiJobStatus as Ci;
                match status {
                    Ci::CREATED => Self::Created,
                    Ci::WAITING_FOR_RESOURCE => Self::WaitingForResource,
                    Ci::PREPARING => Self::Preparing,
                    Ci::WAITING_FOR_CALLBACK => Self::WaitingForCallback,
                    Ci::PENDING => Self::Pending,
                    Ci::RUNNING => Self::Running,
                    Ci::FAILED => Self::Failed,
                    Ci::SUCCESS => Self::Success,
                    Ci::CANCELED => Self::Canceled,
                    Ci::CANCELING => Self::Canceling,
                    Ci::SKIPPED => Self::Skipped,
                    Ci::MANUAL => Self::Manual,
                    Ci::SCHEDULED => Self::Scheduled,
                    Ci::Other(_) => Self::Unknown,
                }
            }
        }
    )+};
}

job_status_from!(
    fetch_project_pipelines,
    fetch_merge_request_pipelines,
    fetch_branch_merge_request_pipelines,
);

impl GitLabClient {
    /// Fetches the pipelines (and their jobs) a selection context points at.
    ///
    /// # Arguments
    /// * `ctx` - Project and locator (commit, branch, or merge request)
    /// * `limit` - Maximum number of pipelines to fetch
    ///
    /// # Errors
    /// Returns an error if the request fails, the project does not exist, or
    /// the response cannot be decoded. A merge request that does not exist
    /// yields an empty graph.
    pub async fn fetch_pipeline_graph(
        &self,
        ctx: &SelectionContext,
        limit: usize,
    ) -> Result<PipelineGraph, HostError> {
        let first = i64::try_from(limit).unwrap_or(i64::MAX);
        let project_path = ctx.project_path.as_str();

        let graph = match &ctx.locator {
            Locator::Commit { sha, branch } => {
                self.fetch_project_pipelines(
                    project_path,
                    Some(sha.as_str()),
                    branch.as_deref(),
                    first,
                )
                .await?
            }
            Locator::Branch { name } => {
                self.fetch_project_pipelines(project_path, None, Some(name.as_str()), first)
                    .await?
            }
            Locator::MergeRequest { iid } => {
                self.fetch_merge_request_pipelines(project_path, iid, first)
                    .await?
            }
            Locator::BranchMergeRequest { source_branch } => {
                self.fetch_branch_merge_request_pipelines(project_path, source_branch, first)
                    .await?
            }
        };

        debug!(
            "Fetched {} pipelines with {} jobs for {}",
            graph.len(),
            graph.job_count(),
            ctx
        );

        Ok(graph)
    }

    async fn fetch_project_pipelines(
        &self,
        project_path: &str,
        sha: Option<&str>,
        ref_: Option<&str>,
        first: i64,
    ) -> Result<PipelineGraph, HostError> {
        let variables = fetch_project_pipelines::Variables {
            project_path: project_path.to_string(),
            sha: sha.map(ToString::to_string),
            ref_: ref_.map(ToString::to_string),
            first,
        };

        let request_body = FetchProjectPipelines::build_query(variables);

        let data: fetch_project_pipelines::ResponseData = self
            .execute_graphql_request(&request_body, Effect::ReadOnly)
            .await?;

        let project = data
            .project
            .ok_or_else(|| HostError::ProjectNotFound(project_path.to_string()))?;

        let mut graph = PipelineGraph::new();
        for node in project
            .pipelines
            .into_iter()
            .flat_map(|conn| conn.nodes)
            .flatten()
            .flatten()
        {
            graph.insert(decode_pipeline!(node));
        }

        Ok(graph)
    }

    async fn fetch_merge_request_pipelines(
        &self,
        project_path: &str,
        iid: &str,
        first: i64,
    ) -> Result<PipelineGraph, HostError> {
        let variables = fetch_merge_request_pipelines::Variables {
            project_path: project_path.to_string(),
            iid: iid.to_string(),
            first,
        };

        let request_body = FetchMergeRequestPipelines::build_query(variables);

        let data: fetch_merge_request_pipelines::ResponseData = self
            .execute_graphql_request(&request_body, Effect::ReadOnly)
            .await?;

        let project = data
            .project
            .ok_or_else(|| HostError::ProjectNotFound(project_path.to_string()))?;

        let mut graph = PipelineGraph::new();
        for node in project
            .merge_request
            .into_iter()
            .flat_map(|mr| mr.pipelines)
            .flat_map(|conn| conn.nodes)
            .flatten()
            .flatten()
        {
            graph.insert(decode_pipeline!(node));
        }

        Ok(graph)
    }

    async fn fetch_branch_merge_request_pipelines(
        &self,
        project_path: &str,
        source_branch: &str,
        first: i64,
    ) -> Result<PipelineGraph, HostError> {
        let variables = fetch_branch_merge_request_pipelines::Variables {
            project_path: project_path.to_string(),
            source_branch: source_branch.to_string(),
            first,
        };

        let request_body = FetchBranchMergeRequestPipelines::build_query(variables);

        let data: fetch_branch_merge_request_pipelines::ResponseData = self
            .execute_graphql_request(&request_body, Effect::ReadOnly)
            .await?;

        let project = data
            .project
            .ok_or_else(|| HostError::ProjectNotFound(project_path.to_string()))?;

        // The query asks for a single merge request; only the first is used
        // should GitLab ever return more.
        let merge_request = project
            .merge_requests
            .into_iter()
            .flat_map(|conn| conn.nodes)
            .flatten()
            .flatten()
            .next();

        if let Some(mr) = &merge_request {
            debug!("Using merge request !{} for branch {source_branch}", mr.iid);
        }

        let mut graph = PipelineGraph::new();
        for node in merge_request
            .into_iter()
            .flat_map(|mr| mr.pipelines)
            .flat_map(|conn| conn.nodes)
            .flatten()
            .flatten()
        {
            graph.insert(decode_pipeline!(node));
        }

        Ok(graph)
    }
}
