use log::info;

use crate::auth::Token;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::host::HostApi;
use crate::output::StepProgress;
use crate::publisher::{Publisher, StatusReport};
use crate::report::RunReport;
use crate::resolver::{
    Locator, PlayablePolicy, ResolvedTarget, Resolver, RetryPolicy, SelectionContext,
};
use crate::status::{translate, BuildOutcome, HostStatus};
use crate::trigger::{JobTrigger, PlayMechanism, TriggerVariables};

/// Settings shared by every step of a run, assembled once up front.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// GitLab web base URL, for report links
    pub base_url: String,
    pub pipeline_limit: usize,
    pub status_name: String,
    pub status_description: String,
    pub playable_policy: PlayablePolicy,
    pub retry: RetryPolicy,
    pub trigger_enabled: bool,
    pub play_mechanism: PlayMechanism,
}

impl From<&Config> for RelayConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.gitlab.base_url.clone(),
            pipeline_limit: config.gitlab.pipeline_limit,
            status_name: config.status.name.clone(),
            status_description: config.status.description.clone(),
            playable_policy: config.resolver.playable_policy,
            retry: config.retry_policy(),
            trigger_enabled: config.trigger.enabled,
            play_mechanism: config.trigger.play_mechanism,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Per-build inputs of a `report` run.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub context: SelectionContext,
    pub job_name: String,
    pub outcome: BuildOutcome,
    /// Commit the status is attached to
    pub commit_sha: String,
    pub build_url: Option<String>,
    pub variables: TriggerVariables,
}

/// Runs resolve → translate → publish → trigger against one host.
pub struct Relay<'a, H: HostApi + ?Sized> {
    host: &'a H,
    config: &'a RelayConfig,
    progress: bool,
}

impl<'a, H: HostApi + ?Sized> Relay<'a, H> {
    pub fn new(host: &'a H, config: &'a RelayConfig) -> Self {
        Self {
            host,
            config,
            progress: false,
        }
    }

    /// Show a spinner on stderr for each step.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn resolver(&self) -> Resolver<'a, H> {
        Resolver::new(self.host)
            .with_policy(self.config.playable_policy)
            .with_retry(self.config.retry)
            .with_pipeline_limit(self.config.pipeline_limit)
    }

    async fn resolve_target(
        &self,
        ctx: &SelectionContext,
        job_name: &str,
    ) -> Result<ResolvedTarget> {
        if job_name.trim().is_empty() {
            return Err(RelayError::Configuration("a job name is required".to_string()));
        }

        let step = StepProgress::start(self.progress, format!("Resolving job '{job_name}'"));
        match self.resolver().resolve(ctx, job_name).await {
            Ok(target) => {
                step.succeed(format!(
                    "Resolved '{job_name}' to job {} in pipeline {}",
                    target.job.id.numeric, target.pipeline_id.numeric
                ));
                Ok(target)
            }
            Err(e) => {
                step.fail(format!("Could not resolve job '{job_name}'"));
                Err(e)
            }
        }
    }

    /// Resolves the job without touching anything on the host.
    pub async fn resolve(&self, ctx: &SelectionContext, job_name: &str) -> Result<RunReport> {
        let target = self.resolve_target(ctx, job_name).await?;
        Ok(RunReport::new(&self.config.base_url, ctx, &target))
    }

    /// Publishes the build result for the resolved pipeline and, after a
    /// successful build, plays the resolved job.
    ///
    /// # Errors
    ///
    /// Every failure ends the run. In particular a failed status publish
    /// returns before any trigger is attempted.
    pub async fn report(&self, request: &ReportRequest) -> Result<RunReport> {
        if request.commit_sha.trim().is_empty() {
            return Err(RelayError::Configuration(
                "a commit SHA is required to publish a status".to_string(),
            ));
        }

        let ctx = &request.context;
        let target = self.resolve_target(ctx, &request.job_name).await?;
        let mut report = RunReport::new(&self.config.base_url, ctx, &target);

        let status = translate(&request.outcome);
        info!(
            "Build outcome '{}' maps to status '{status}'",
            request.outcome.as_str()
        );

        let step = StepProgress::start(self.progress, format!("Publishing status '{status}'"));
        let published = Publisher::new(self.host)
            .with_label(&self.config.status_name, &self.config.status_description)
            .publish(StatusReport {
                project_path: &ctx.project_path,
                pipeline_id: &target.pipeline_id.numeric,
                sha: &request.commit_sha,
                status: status.as_str(),
                build_url: request.build_url.as_deref(),
                ref_: branch_of(&ctx.locator),
            })
            .await;
        match published {
            Ok(state) => {
                step.succeed(format!("Published status '{state}'"));
                report.status = Some(state);
            }
            Err(e) => {
                step.fail("Publishing status failed");
                return Err(e);
            }
        }

        if status != HostStatus::Success {
            info!("Not triggering '{}': build status is {status}", target.job.name);
        } else if !self.config.trigger_enabled {
            info!("Not triggering '{}': triggering is disabled", target.job.name);
        } else {
            let step = StepProgress::start(
                self.progress,
                format!("Triggering job '{}'", target.job.name),
            );
            let triggered = JobTrigger::new(self.host, self.config.play_mechanism)
                .trigger_by_job_id(&ctx.project_path, &target, &request.variables)
                .await;
            match triggered {
                Ok(()) => {
                    step.succeed(format!("Triggered job {}", target.job.id.numeric));
                    report.triggered = true;
                }
                Err(e) => {
                    step.fail("Triggering job failed");
                    return Err(e);
                }
            }
        }

        report.finished_at = chrono::Utc::now();
        Ok(report)
    }

    /// Starts a new pipeline for `ref_` (no lookup, no status).
    pub async fn trigger_pipeline(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &TriggerVariables,
    ) -> Result<()> {
        let step = StepProgress::start(self.progress, format!("Triggering pipeline on {ref_}"));
        let result = JobTrigger::new(self.host, self.config.play_mechanism)
            .trigger_by_project_ref(project_path, trigger_token, ref_, variables)
            .await;
        match &result {
            Ok(()) => step.succeed(format!("Triggered pipeline on {ref_}")),
            Err(_) => step.fail("Triggering pipeline failed"),
        }
        result
    }
}

fn branch_of(locator: &Locator) -> Option<&str> {
    match locator {
        Locator::Commit { branch, .. } => branch.as_deref(),
        Locator::Branch { name } => Some(name),
        Locator::MergeRequest { .. } | Locator::BranchMergeRequest { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HostError, Stage};
    use crate::resolver::SelectionMode;
    use crate::testing::{graph, job, pipeline, FakeHost};
    use tokio_test::{assert_err, assert_ok};

    fn request(outcome: &str) -> ReportRequest {
        ReportRequest {
            context: SelectionContext::from_inputs(
                "group/project",
                Some("abc123"),
                Some("main"),
                None,
                SelectionMode::Auto,
            )
            .unwrap(),
            job_name: "deploy".to_string(),
            outcome: outcome.into(),
            commit_sha: "abc123".to_string(),
            build_url: Some("https://app.bitrise.io/build/xyz".to_string()),
            variables: TriggerVariables::new("api-token", "app-slug", "build-slug"),
        }
    }

    fn host() -> FakeHost {
        FakeHost::with_graph(graph(vec![pipeline(
            42,
            vec![job(76, "build", false), job(77, "deploy", true)],
        )]))
    }

    #[tokio::test]
    async fn test_success_publishes_then_triggers_once() {
        let host = host();
        let config = RelayConfig::default();

        let report = assert_ok!(Relay::new(&host, &config).report(&request("0")).await);

        assert_eq!(report.status, Some(HostStatus::Success));
        assert!(report.triggered);
        assert_eq!(host.publish_calls(), 1);
        assert_eq!(host.play_calls(), 1);
        assert_eq!(host.played_jobs()[0].0.numeric, "77");

        let (_, sha, update) = &host.published_statuses()[0];
        assert_eq!(sha, "abc123");
        assert_eq!(update.pipeline_id, "42");
        assert_eq!(update.ref_.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_failure_publishes_failed_and_never_triggers() {
        let host = host();
        let config = RelayConfig::default();

        let report = assert_ok!(Relay::new(&host, &config).report(&request("1")).await);

        assert_eq!(report.status, Some(HostStatus::Failed));
        assert!(!report.triggered);
        assert_eq!(host.published_statuses()[0].2.state, HostStatus::Failed);
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_indeterminate_outcome_publishes_pending_only() {
        let host = host();
        let config = RelayConfig::default();

        let report = assert_ok!(Relay::new(&host, &config).report(&request("")).await);

        assert_eq!(report.status, Some(HostStatus::Pending));
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_stops_before_trigger() {
        let host = host().failing_publish(HostError::Http {
            status: 500,
            body: "internal error".into(),
        });
        let config = RelayConfig::default();

        let err = assert_err!(Relay::new(&host, &config).report(&request("0")).await);

        assert!(matches!(
            err,
            RelayError::Host {
                stage: Stage::Publish,
                ..
            }
        ));
        assert_eq!(host.publish_calls(), 1);
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_publish_outcome_stops_before_trigger() {
        let host = host().failing_publish(HostError::OutcomeUnknown {
            operation: "commit status update".into(),
        });
        let config = RelayConfig::default();

        let err = assert_err!(Relay::new(&host, &config).report(&request("0")).await);

        assert!(err.to_string().contains("unknown"));
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_publishes_nothing() {
        let host = host();
        let config = RelayConfig::default();
        let mut request = request("0");
        request.job_name = "release".to_string();

        let err = assert_err!(Relay::new(&host, &config).report(&request).await);

        assert!(matches!(err, RelayError::NotFound { .. }));
        assert_eq!(host.publish_calls(), 0);
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_trigger_disabled_publishes_only() {
        let host = host();
        let config = RelayConfig {
            trigger_enabled: false,
            ..RelayConfig::default()
        };

        let report = assert_ok!(Relay::new(&host, &config).report(&request("0")).await);

        assert!(!report.triggered);
        assert_eq!(host.publish_calls(), 1);
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_trigger_variables_fail_after_publish() {
        let host = host();
        let config = RelayConfig::default();
        let mut request = request("0");
        request.variables = TriggerVariables::new("api-token", "", "build-slug");

        let err = assert_err!(Relay::new(&host, &config).report(&request).await);

        assert!(matches!(err, RelayError::Precondition(_)));
        assert_eq!(host.publish_calls(), 1);
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_commit_sha_fails_before_any_call() {
        let host = host();
        let config = RelayConfig::default();
        let mut request = request("0");
        request.commit_sha = String::new();

        let err = assert_err!(Relay::new(&host, &config).report(&request).await);

        assert!(matches!(err, RelayError::Configuration(_)));
        assert_eq!(host.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_has_no_side_effects() {
        let host = host();
        let config = RelayConfig::default();
        let request = request("0");

        let report = assert_ok!(
            Relay::new(&host, &config)
                .resolve(&request.context, "deploy")
                .await
        );

        assert_eq!(report.job.id, "gid://gitlab/Ci::Build/77");
        assert_eq!(report.status, None);
        assert_eq!(host.fetch_calls(), 1);
        assert_eq!(host.publish_calls(), 0);
        assert_eq!(host.play_calls(), 0);
        assert_eq!(host.fetched_contexts()[0], request.context);
    }

    #[tokio::test]
    async fn test_trigger_pipeline_greenfield() {
        let host = FakeHost::default();
        let config = RelayConfig::default();

        assert_ok!(
            Relay::new(&host, &config)
                .trigger_pipeline(
                    "group/project",
                    &Token::from("trigger"),
                    "main",
                    &TriggerVariables::new("a", "b", "c"),
                )
                .await
        );

        assert_eq!(host.pipeline_trigger_calls(), 1);
        assert_eq!(host.fetch_calls(), 0);
    }
}
