use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result, Stage};
use crate::host::HostApi;
use crate::providers::gitlab::{GlobalId, Job, PipelineGraph};

pub const DEFAULT_PIPELINE_LIMIT: usize = 20;

/// What a run is about: a commit, a branch, or a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Pipelines for a commit, optionally narrowed to one ref
    Commit { sha: String, branch: Option<String> },
    /// Pipelines for a branch
    Branch { name: String },
    /// Pipelines of one merge request
    MergeRequest { iid: String },
    /// Pipelines of the first open merge request from a source branch
    BranchMergeRequest { source_branch: String },
}

/// How [`SelectionContext::from_inputs`] picks a locator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Merge request IID if given, then commit SHA, then branch
    #[default]
    Auto,
    Commit,
    Branch,
    /// By IID, or the open merge request whose source branch matches
    MergeRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionContext {
    pub project_path: String,
    #[serde(flatten)]
    pub locator: Locator,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl SelectionContext {
    /// Builds a context from the raw run inputs. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the project path is blank, when the
    /// fields `mode` needs are missing, or when the merge request IID is not a
    /// number.
    pub fn from_inputs(
        project_path: &str,
        sha: Option<&str>,
        branch: Option<&str>,
        merge_request: Option<&str>,
        mode: SelectionMode,
    ) -> Result<Self> {
        let project_path = project_path.trim();
        if project_path.is_empty() {
            return Err(RelayError::Configuration(
                "a GitLab project path is required".to_string(),
            ));
        }

        let sha = present(sha);
        let branch = present(branch);
        let merge_request = present(merge_request);

        if let Some(iid) = merge_request {
            if !iid.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RelayError::Configuration(format!(
                    "merge request IID must be numeric, got '{iid}'"
                )));
            }
        }

        let commit = |sha: &str| Locator::Commit {
            sha: sha.to_string(),
            branch: branch.map(ToString::to_string),
        };

        let locator = match mode {
            SelectionMode::Auto => match (merge_request, sha, branch) {
                (Some(iid), _, _) => Some(Locator::MergeRequest {
                    iid: iid.to_string(),
                }),
                (None, Some(sha), _) => Some(commit(sha)),
                (None, None, Some(name)) => Some(Locator::Branch {
                    name: name.to_string(),
                }),
                (None, None, None) => None,
            },
            SelectionMode::Commit => sha.map(commit),
            SelectionMode::Branch => branch.map(|name| Locator::Branch {
                name: name.to_string(),
            }),
            SelectionMode::MergeRequest => match (merge_request, branch) {
                (Some(iid), _) => Some(Locator::MergeRequest {
                    iid: iid.to_string(),
                }),
                (None, Some(source_branch)) => Some(Locator::BranchMergeRequest {
                    source_branch: source_branch.to_string(),
                }),
                (None, None) => None,
            },
        };

        let locator = locator.ok_or_else(|| {
            let needed = match mode {
                SelectionMode::Auto => "a commit SHA, branch or merge request IID",
                SelectionMode::Commit => "a commit SHA",
                SelectionMode::Branch => "a branch name",
                SelectionMode::MergeRequest => "a merge request IID or source branch",
            };
            RelayError::Configuration(format!("selecting pipelines requires {needed}"))
        })?;

        Ok(Self {
            project_path: project_path.to_string(),
            locator,
        })
    }
}

impl fmt::Display for SelectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Locator::Commit { sha, branch: None } => write!(f, "commit {sha}")?,
            Locator::Commit {
                sha,
                branch: Some(branch),
            } => write!(f, "commit {sha} on {branch}")?,
            Locator::Branch { name } => write!(f, "branch {name}")?,
            Locator::MergeRequest { iid } => write!(f, "merge request !{iid}")?,
            Locator::BranchMergeRequest { source_branch } => {
                write!(f, "merge request from {source_branch}")?;
            }
        }
        write!(f, " in {}", self.project_path)
    }
}

/// Whether a job's playable flag matters while matching by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayablePolicy {
    /// Match on name alone; playability is checked only when triggering
    #[default]
    Any,
    /// Skip jobs GitLab reports as not playable
    PlayableOnly,
}

impl PlayablePolicy {
    fn admits(self, job: &Job) -> bool {
        match self {
            Self::Any => true,
            Self::PlayableOnly => job.playable,
        }
    }
}

/// Read-only query retries. Mutations are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

/// The job a run acts on and the pipeline it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget {
    pub job: Job,
    pub pipeline_id: GlobalId,
    pub pipeline_iid: String,
}

/// Returns the first job named `job_name`, walking pipelines and jobs in the
/// order GitLab returned them.
pub fn find_job(
    graph: &PipelineGraph,
    job_name: &str,
    policy: PlayablePolicy,
) -> Option<ResolvedTarget> {
    for pipeline in graph.pipelines() {
        for job in pipeline.jobs.iter().filter(|job| job.name == job_name) {
            if !policy.admits(job) {
                warn!(
                    "Skipping job {} in pipeline {}: not playable",
                    job.id.numeric, pipeline.id.numeric
                );
                continue;
            }
            return Some(ResolvedTarget {
                job: job.clone(),
                pipeline_id: pipeline.id.clone(),
                pipeline_iid: pipeline.iid.clone(),
            });
        }
    }
    None
}

pub struct Resolver<'a, H: HostApi + ?Sized> {
    host: &'a H,
    policy: PlayablePolicy,
    retry: RetryPolicy,
    pipeline_limit: usize,
}

impl<'a, H: HostApi + ?Sized> Resolver<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            policy: PlayablePolicy::default(),
            retry: RetryPolicy::default(),
            pipeline_limit: DEFAULT_PIPELINE_LIMIT,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PlayablePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_pipeline_limit(mut self, limit: usize) -> Self {
        self.pipeline_limit = limit;
        self
    }

    /// Finds the job named `job_name` among the pipelines `ctx` selects.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no pipeline contains a matching job, or a host
    /// error (after retries) when the lookup itself fails.
    pub async fn resolve(&self, ctx: &SelectionContext, job_name: &str) -> Result<ResolvedTarget> {
        info!("Resolving job '{job_name}' for {ctx}");

        let graph = self.fetch_with_retry(ctx).await?;

        let target = find_job(&graph, job_name, self.policy).ok_or_else(|| {
            RelayError::NotFound {
                job: job_name.to_string(),
                context: format!("{ctx} ({} pipelines searched)", graph.len()),
            }
        })?;

        info!(
            "Resolved job '{job_name}' to {} in pipeline {}",
            target.job.id, target.pipeline_id.numeric
        );

        Ok(target)
    }

    async fn fetch_with_retry(&self, ctx: &SelectionContext) -> Result<PipelineGraph> {
        let mut retry_count = 0;
        loop {
            match self.host.fetch_pipeline_graph(ctx, self.pipeline_limit).await {
                Ok(graph) => return Ok(graph),
                Err(e) if e.is_retryable() && retry_count < self.retry.retries => {
                    warn!(
                        "Pipeline lookup failed ({e}), retrying in {}ms ({}/{})...",
                        self.retry.delay.as_millis(),
                        retry_count + 1,
                        self.retry.retries
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(RelayError::host(Stage::Resolve)(e)),
            }
        }
    }
}
