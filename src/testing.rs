//! In-memory GitLab host for unit tests.
//!
//! Records every call so tests can assert on ordering and call counts
//! without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::Token;
use crate::error::HostError;
use crate::host::HostApi;
use crate::providers::gitlab::{
    CommitStatusUpdate, GlobalId, Job, JobStatus, Pipeline, PipelineGraph,
};
use crate::resolver::{ResolvedTarget, SelectionContext};
use crate::trigger::{PlayMechanism, TriggerVariables};

#[derive(Debug, Default)]
pub struct FakeHost {
    graph: PipelineGraph,
    fetch_failures: Mutex<VecDeque<HostError>>,
    publish_failure: Mutex<Option<HostError>>,
    play_failure: Mutex<Option<HostError>>,
    fetches: Mutex<Vec<SelectionContext>>,
    statuses: Mutex<Vec<(String, String, CommitStatusUpdate)>>,
    pipeline_triggers: Mutex<Vec<(String, String)>>,
    plays: Mutex<Vec<(GlobalId, PlayMechanism)>>,
}

impl FakeHost {
    pub fn with_graph(graph: PipelineGraph) -> Self {
        Self {
            graph,
            ..Self::default()
        }
    }

    /// Fails the next fetches with these errors, in order.
    pub fn failing_fetches(self, errors: Vec<HostError>) -> Self {
        *self.fetch_failures.lock().unwrap() = errors.into();
        self
    }

    pub fn failing_publish(self, error: HostError) -> Self {
        *self.publish_failure.lock().unwrap() = Some(error);
        self
    }

    pub fn failing_play(self, error: HostError) -> Self {
        *self.play_failure.lock().unwrap() = Some(error);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn publish_calls(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn play_calls(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn pipeline_trigger_calls(&self) -> usize {
        self.pipeline_triggers.lock().unwrap().len()
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_calls()
            + self.publish_calls()
            + self.play_calls()
            + self.pipeline_trigger_calls()
    }

    pub fn fetched_contexts(&self) -> Vec<SelectionContext> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn published_statuses(&self) -> Vec<(String, String, CommitStatusUpdate)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn played_jobs(&self) -> Vec<(GlobalId, PlayMechanism)> {
        self.plays.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn fetch_pipeline_graph(
        &self,
        ctx: &SelectionContext,
        _limit: usize,
    ) -> Result<PipelineGraph, HostError> {
        self.fetches.lock().unwrap().push(ctx.clone());
        if let Some(error) = self.fetch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.graph.clone())
    }

    async fn update_commit_status(
        &self,
        project_path: &str,
        sha: &str,
        update: &CommitStatusUpdate,
    ) -> Result<(), HostError> {
        self.statuses.lock().unwrap().push((
            project_path.to_string(),
            sha.to_string(),
            update.clone(),
        ));
        match self.publish_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn trigger_pipeline(
        &self,
        project_path: &str,
        _trigger_token: &Token,
        ref_: &str,
        _variables: &TriggerVariables,
    ) -> Result<(), HostError> {
        self.pipeline_triggers
            .lock()
            .unwrap()
            .push((project_path.to_string(), ref_.to_string()));
        Ok(())
    }

    async fn play_job(
        &self,
        _project_path: &str,
        job: &GlobalId,
        _variables: &TriggerVariables,
        mechanism: PlayMechanism,
    ) -> Result<(), HostError> {
        self.plays.lock().unwrap().push((job.clone(), mechanism));
        match self.play_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn job(id: u64, name: &str, playable: bool) -> Job {
    Job {
        id: GlobalId::parse(&format!("gid://gitlab/Ci::Build/{id}")).unwrap(),
        name: name.to_string(),
        status: if playable {
            JobStatus::Manual
        } else {
            JobStatus::Success
        },
        playable,
    }
}

pub fn pipeline(id: u64, jobs: Vec<Job>) -> Pipeline {
    Pipeline {
        id: GlobalId::parse(&format!("gid://gitlab/Ci::Pipeline/{id}")).unwrap(),
        iid: id.to_string(),
        jobs,
    }
}

pub fn graph(pipelines: Vec<Pipeline>) -> PipelineGraph {
    pipelines.into_iter().collect()
}

pub fn target_in(pipeline_id: u64, job: Job) -> ResolvedTarget {
    let pipeline = pipeline(pipeline_id, Vec::new());
    ResolvedTarget {
        job,
        pipeline_id: pipeline.id,
        pipeline_iid: pipeline.iid,
    }
}
