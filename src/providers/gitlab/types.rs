use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// A GitLab GraphQL Global ID together with its numeric database ID.
///
/// GraphQL mutations address objects by the global form
/// (e.g. `gid://gitlab/Ci::Pipeline/123`) while the REST API wants the
/// trailing number. Both are derived once, when the response is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalId {
    pub gid: String,
    pub numeric: String,
}

impl GlobalId {
    pub fn parse(gid: &str) -> Result<Self, HostError> {
        let numeric = gid
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| HostError::MalformedResponse {
                reason: "global ID has no numeric suffix".to_string(),
                body: gid.to_string(),
            })?;

        Ok(Self {
            gid: gid.to_string(),
            numeric: numeric.to_string(),
        })
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gid)
    }
}

/// Job status as reported by GitLab (`CiJobStatus`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Canceling,
    Skipped,
    Manual,
    Scheduled,
    WaitingForCallback,
    Unknown,
}

/// A job within a GitLab CI/CD pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// GraphQL Global ID (e.g., <gid://gitlab/Ci::Build/456>)
    pub id: GlobalId,
    /// Job name as defined in .gitlab-ci.yml, not unique within a pipeline
    pub name: String,
    pub status: JobStatus,
    /// Whether GitLab currently allows starting this job
    pub playable: bool,
}

/// A GitLab CI/CD pipeline and its jobs in the order GitLab listed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// GraphQL Global ID (e.g., <gid://gitlab/Ci::Pipeline/123>)
    pub id: GlobalId,
    /// Project-scoped pipeline number
    pub iid: String,
    pub jobs: Vec<Job>,
}

/// Pipelines returned by a single query, keyed by ID in response order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineGraph {
    pipelines: IndexMap<GlobalId, Pipeline>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pipeline, keeping the position of the first occurrence if
    /// GitLab lists the same pipeline twice.
    pub fn insert(&mut self, pipeline: Pipeline) {
        self.pipelines.entry(pipeline.id.clone()).or_insert(pipeline);
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn job_count(&self) -> usize {
        self.pipelines.values().map(|p| p.jobs.len()).sum()
    }
}

impl FromIterator<Pipeline> for PipelineGraph {
    fn from_iter<I: IntoIterator<Item = Pipeline>>(iter: I) -> Self {
        let mut graph = Self::new();
        for pipeline in iter {
            graph.insert(pipeline);
        }
        graph
    }
}
