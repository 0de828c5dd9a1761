mod core;
pub mod jobs;
pub mod pipelines;
pub mod statuses;

use async_trait::async_trait;

use crate::auth::Token;
use crate::error::HostError;
use crate::host::HostApi;
use crate::resolver::SelectionContext;
use crate::trigger::{PlayMechanism, TriggerVariables};

pub use self::core::GitLabClient;
pub use statuses::CommitStatusUpdate;

use super::types::{GlobalId, PipelineGraph};

#[async_trait]
impl HostApi for GitLabClient {
    async fn fetch_pipeline_graph(
        &self,
        ctx: &SelectionContext,
        limit: usize,
    ) -> Result<PipelineGraph, HostError> {
        GitLabClient::fetch_pipeline_graph(self, ctx, limit).await
    }

    async fn update_commit_status(
        &self,
        project_path: &str,
        sha: &str,
        update: &CommitStatusUpdate,
    ) -> Result<(), HostError> {
        GitLabClient::update_commit_status(self, project_path, sha, update).await
    }

    async fn trigger_pipeline(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &TriggerVariables,
    ) -> Result<(), HostError> {
        GitLabClient::trigger_pipeline(self, project_path, trigger_token, ref_, variables).await
    }

    async fn play_job(
        &self,
        project_path: &str,
        job: &GlobalId,
        variables: &TriggerVariables,
        mechanism: PlayMechanism,
    ) -> Result<(), HostError> {
        match mechanism {
            PlayMechanism::Rest => self.play_job_rest(project_path, job, variables).await,
            PlayMechanism::Graphql => self.play_job_graphql(job, variables).await,
        }
    }
}
