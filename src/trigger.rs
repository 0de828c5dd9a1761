use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::Token;
use crate::error::{RelayError, Result, Stage};
use crate::host::HostApi;
use crate::resolver::ResolvedTarget;

pub const API_TOKEN_KEY: &str = "BITRISE_API_TOKEN";
pub const APP_SLUG_KEY: &str = "BITRISE_APP_SLUG";
pub const BUILD_SLUG_KEY: &str = "BITRISE_BUILD_SLUG";

/// Variables handed to the downstream GitLab job so it can call back into
/// the Bitrise build that started it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TriggerVariables {
    api_token: String,
    app_slug: String,
    build_slug: String,
}

impl TriggerVariables {
    pub fn new(
        api_token: impl Into<String>,
        app_slug: impl Into<String>,
        build_slug: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            app_slug: app_slug.into(),
            build_slug: build_slug.into(),
        }
    }

    pub fn entries(&self) -> [(&'static str, &str); 3] {
        [
            (API_TOKEN_KEY, self.api_token.as_str()),
            (APP_SLUG_KEY, self.app_slug.as_str()),
            (BUILD_SLUG_KEY, self.build_slug.as_str()),
        ]
    }

    /// Fails unless all three variables are non-blank.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<_> = self
            .entries()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Precondition(format!(
                "trigger variables must be set: {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for TriggerVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerVariables")
            .field("api_token", &"****")
            .field("app_slug", &self.app_slug)
            .field("build_slug", &self.build_slug)
            .finish()
    }
}

/// Endpoint used to play a resolved job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMechanism {
    /// `POST /projects/:id/jobs/:job_id/play`
    #[default]
    Rest,
    /// `jobPlay` GraphQL mutation
    Graphql,
}

/// Starts downstream GitLab work. Each method makes at most one request.
pub struct JobTrigger<'a, H: HostApi + ?Sized> {
    host: &'a H,
    mechanism: PlayMechanism,
}

impl<'a, H: HostApi + ?Sized> JobTrigger<'a, H> {
    pub fn new(host: &'a H, mechanism: PlayMechanism) -> Self {
        Self { host, mechanism }
    }

    /// Starts a brand-new pipeline for `ref_`.
    ///
    /// # Errors
    ///
    /// `Precondition` when a trigger variable is blank (nothing is sent),
    /// otherwise the host error of the single attempt.
    pub async fn trigger_by_project_ref(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &TriggerVariables,
    ) -> Result<()> {
        variables.validate()?;
        if trigger_token.is_empty() {
            return Err(RelayError::Configuration(
                "a pipeline trigger token is required".to_string(),
            ));
        }
        if ref_.trim().is_empty() {
            return Err(RelayError::Configuration(
                "a git ref is required to trigger a pipeline".to_string(),
            ));
        }

        info!("Triggering pipeline for {project_path} on {ref_}");

        self.host
            .trigger_pipeline(project_path, trigger_token, ref_, variables)
            .await
            .map_err(RelayError::host(Stage::Trigger))?;

        info!("Pipeline triggered successfully.");
        Ok(())
    }

    /// Plays the job the resolver selected.
    ///
    /// # Errors
    ///
    /// `Precondition` when a trigger variable is blank or the job is not
    /// playable (nothing is sent), otherwise the host error of the single
    /// attempt.
    pub async fn trigger_by_job_id(
        &self,
        project_path: &str,
        target: &ResolvedTarget,
        variables: &TriggerVariables,
    ) -> Result<()> {
        variables.validate()?;
        if !target.job.playable {
            return Err(RelayError::Precondition(format!(
                "job '{}' ({}) in pipeline {} is not playable",
                target.job.name, target.job.id.numeric, target.pipeline_id.numeric
            )));
        }

        info!(
            "Playing job '{}' ({}) via {:?}",
            target.job.name, target.job.id.numeric, self.mechanism
        );

        self.host
            .play_job(project_path, &target.job.id, variables, self.mechanism)
            .await
            .map_err(RelayError::host(Stage::Trigger))?;

        info!("Job {} started.", target.job.id.numeric);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::testing::{job, target_in, FakeHost};

    fn variables() -> TriggerVariables {
        TriggerVariables::new("api-token", "app-slug", "build-slug")
    }

    #[test]
    fn test_validate_lists_missing_variables() {
        let err = TriggerVariables::new("", "app", " ").validate().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, RelayError::Precondition(_)));
        assert!(message.contains(API_TOKEN_KEY));
        assert!(message.contains(BUILD_SLUG_KEY));
        assert!(!message.contains(APP_SLUG_KEY));
    }

    #[test]
    fn test_debug_hides_api_token() {
        let rendered = format!("{:?}", variables());
        assert!(!rendered.contains("api-token"));
        assert!(rendered.contains("app-slug"));
    }

    #[tokio::test]
    async fn test_incomplete_variables_make_no_calls() {
        let host = FakeHost::default();
        let trigger = JobTrigger::new(&host, PlayMechanism::Rest);
        let target = target_in(42, job(77, "deploy", true));

        for incomplete in [
            TriggerVariables::new("", "app", "build"),
            TriggerVariables::new("token", "", "build"),
            TriggerVariables::new("token", "app", ""),
        ] {
            let err = trigger
                .trigger_by_job_id("g/p", &target, &incomplete)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::Precondition(_)));

            let err = trigger
                .trigger_by_project_ref("g/p", &Token::from("t"), "main", &incomplete)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::Precondition(_)));
        }

        assert_eq!(host.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unplayable_job_is_not_triggered() {
        let host = FakeHost::default();
        let trigger = JobTrigger::new(&host, PlayMechanism::Rest);
        let target = target_in(42, job(77, "deploy", false));

        let err = trigger
            .trigger_by_job_id("g/p", &target, &variables())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("not playable"));
        assert_eq!(host.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_trigger_by_job_id_plays_resolved_job_once() {
        let host = FakeHost::default();
        let trigger = JobTrigger::new(&host, PlayMechanism::Graphql);
        let target = target_in(42, job(77, "deploy", true));

        trigger
            .trigger_by_job_id("g/p", &target, &variables())
            .await
            .unwrap();

        assert_eq!(host.play_calls(), 1);
        let played = host.played_jobs();
        assert_eq!(played[0].0.gid, "gid://gitlab/Ci::Build/77");
        assert_eq!(played[0].1, PlayMechanism::Graphql);
    }

    #[tokio::test]
    async fn test_ambiguous_failure_is_not_retried() {
        let host = FakeHost::default().failing_play(HostError::OutcomeUnknown {
            operation: "job play".into(),
        });
        let trigger = JobTrigger::new(&host, PlayMechanism::Rest);
        let target = target_in(42, job(77, "deploy", true));

        let err = trigger
            .trigger_by_job_id("g/p", &target, &variables())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelayError::Host {
                stage: Stage::Trigger,
                source: HostError::OutcomeUnknown { .. }
            }
        ));
        assert_eq!(host.play_calls(), 1);
    }

    #[tokio::test]
    async fn test_trigger_by_project_ref() {
        let host = FakeHost::default();
        let trigger = JobTrigger::new(&host, PlayMechanism::Rest);

        trigger
            .trigger_by_project_ref("g/p", &Token::from("trigger"), "main", &variables())
            .await
            .unwrap();

        assert_eq!(host.pipeline_trigger_calls(), 1);
        assert_eq!(host.play_calls(), 0);
    }
}
