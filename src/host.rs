use async_trait::async_trait;

use crate::auth::Token;
use crate::error::HostError;
use crate::providers::gitlab::{CommitStatusUpdate, GlobalId, PipelineGraph};
use crate::resolver::SelectionContext;
use crate::trigger::{PlayMechanism, TriggerVariables};

/// The GitLab operations the relay depends on.
///
/// `GitLabClient` is the production implementation; tests substitute an
/// in-memory host that records calls.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn fetch_pipeline_graph(
        &self,
        ctx: &SelectionContext,
        limit: usize,
    ) -> Result<PipelineGraph, HostError>;

    async fn update_commit_status(
        &self,
        project_path: &str,
        sha: &str,
        update: &CommitStatusUpdate,
    ) -> Result<(), HostError>;

    async fn trigger_pipeline(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &TriggerVariables,
    ) -> Result<(), HostError>;

    async fn play_job(
        &self,
        project_path: &str,
        job: &GlobalId,
        variables: &TriggerVariables,
        mechanism: PlayMechanism,
    ) -> Result<(), HostError>;
}
