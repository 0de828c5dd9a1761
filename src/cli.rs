use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::auth::Token;
use crate::config::Config;
use crate::error::RelayError;
use crate::output;
use crate::providers::gitlab::{project_path_from_repository_url, GitLabClient};
use crate::relay::{Relay, RelayConfig, ReportRequest};
use crate::report::RunReport;
use crate::resolver::{PlayablePolicy, SelectionContext, SelectionMode};
use crate::trigger::{PlayMechanism, TriggerVariables};

#[derive(Parser)]
#[command(name = "pipeline-relay")]
#[command(
    author,
    version,
    about = "Report Bitrise build results to GitLab and trigger the matching job",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// No banner or progress spinners
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,
}

#[derive(Args)]
struct GitLabArgs {
    #[arg(short, long, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: String,

    /// GitLab instance URL [default: https://gitlab.com]
    #[arg(short, long, env = "GITLAB_URL")]
    url: Option<String>,

    /// REST API base URL, when it is not {url}/api/v4
    #[arg(long, env = "GITLAB_API_URL")]
    api_url: Option<String>,

    /// Project path, e.g. group/project
    #[arg(short = 'P', long, env = "GITLAB_PROJECT_PATH")]
    project: Option<String>,

    /// Git remote the project path is derived from when --project is absent
    #[arg(long, env = "GIT_REPOSITORY_URL")]
    repository_url: Option<String>,

    #[arg(long, env = "GITLAB_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct SelectionArgs {
    /// Downstream job name (exact, case-sensitive)
    #[arg(short, long, env = "GITLAB_JOB_NAME")]
    job: String,

    #[arg(long, env = "BITRISE_GIT_COMMIT")]
    commit: Option<String>,

    #[arg(short, long, env = "BITRISE_GIT_BRANCH")]
    branch: Option<String>,

    /// Merge request IID
    #[arg(short, long, env = "BITRISE_PULL_REQUEST")]
    merge_request: Option<String>,

    #[arg(long, value_enum, default_value_t = SelectionMode::Auto)]
    select: SelectionMode,

    #[arg(long, value_enum)]
    playable_policy: Option<PlayablePolicy>,
}

#[derive(Args)]
struct TriggerVariableArgs {
    #[arg(long, env = "BITRISE_API_TOKEN", hide_env_values = true, default_value = "")]
    bitrise_api_token: String,

    #[arg(long, env = "BITRISE_APP_SLUG", default_value = "")]
    bitrise_app_slug: String,

    #[arg(long, env = "BITRISE_BUILD_SLUG", default_value = "")]
    bitrise_build_slug: String,
}

impl TriggerVariableArgs {
    fn variables(&self) -> TriggerVariables {
        TriggerVariables::new(
            &self.bitrise_api_token,
            &self.bitrise_app_slug,
            &self.bitrise_build_slug,
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the build status and, after a successful build, play the job
    Report {
        #[command(flatten)]
        gitlab: GitLabArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        variables: TriggerVariableArgs,

        /// Bitrise build result: 0 success, 1 failure, anything else pending
        #[arg(long, env = "BITRISE_BUILD_STATUS", default_value = "")]
        outcome: String,

        #[arg(long, env = "BITRISE_BUILD_URL")]
        build_url: Option<String>,

        /// Publish the status only
        #[arg(long, default_value_t = false)]
        no_trigger: bool,

        #[arg(long, value_enum)]
        play_via: Option<PlayMechanism>,
    },

    /// Find the job and print it, without side effects
    Resolve {
        #[command(flatten)]
        gitlab: GitLabArgs,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Start a new pipeline for a ref through the pipeline trigger API
    TriggerPipeline {
        #[command(flatten)]
        gitlab: GitLabArgs,

        #[command(flatten)]
        variables: TriggerVariableArgs,

        /// Branch or tag to run the pipeline for
        #[arg(long = "ref", env = "BITRISE_GIT_BRANCH")]
        ref_: String,

        /// Pipeline trigger token [default: --token]
        #[arg(long, env = "GITLAB_TRIGGER_TOKEN", hide_env_values = true)]
        trigger_token: Option<String>,
    },
}

impl GitLabArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.gitlab.base_url.clone_from(url);
        }
        if let Some(api_url) = &self.api_url {
            config.gitlab.api_url = Some(api_url.clone());
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.gitlab.timeout_secs = timeout_secs;
        }
    }

    fn project_path(&self) -> Result<String, RelayError> {
        if let Some(project) = self.project.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(project.trim().to_string());
        }

        match self.repository_url.as_deref() {
            Some(url) => project_path_from_repository_url(url).ok_or_else(|| {
                RelayError::Configuration(format!(
                    "cannot derive a project path from repository URL '{url}'"
                ))
            }),
            None => Err(RelayError::Configuration(
                "--project or --repository-url is required".to_string(),
            )),
        }
    }

    fn client(
        &self,
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<GitLabClient, RelayError> {
        Ok(GitLabClient::new(
            &config.gitlab.base_url,
            config.gitlab.api_url.as_deref(),
            Token::from(self.token.as_str()),
        )?
        .with_timeout(config.timeout())
        .with_cancellation(cancel))
    }
}

impl SelectionArgs {
    fn context(&self, project_path: &str) -> Result<SelectionContext, RelayError> {
        SelectionContext::from_inputs(
            project_path,
            self.commit.as_deref(),
            self.branch.as_deref(),
            self.merge_request.as_deref(),
            self.select,
        )
    }
}

impl Cli {
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    fn write_report(&self, report: &RunReport) -> Result<()> {
        let json_output = report.to_json(self.pretty)?;

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write report: {}", output_path.display()))?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        Ok(())
    }

    pub async fn execute(&self, cancel: CancellationToken) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Report {
                gitlab,
                selection,
                variables,
                outcome,
                build_url,
                no_trigger,
                play_via,
            } => {
                gitlab.apply(&mut config);
                if let Some(policy) = selection.playable_policy {
                    config.resolver.playable_policy = policy;
                }
                if let Some(mechanism) = play_via {
                    config.trigger.play_mechanism = *mechanism;
                }
                if *no_trigger {
                    config.trigger.enabled = false;
                }

                let project_path = gitlab.project_path()?;
                info!("Reporting build status for project: {project_path}");

                let request = ReportRequest {
                    context: selection.context(&project_path)?,
                    job_name: selection.job.clone(),
                    outcome: outcome.as_str().into(),
                    commit_sha: selection.commit.clone().unwrap_or_default(),
                    build_url: build_url.clone(),
                    variables: variables.variables(),
                };

                let client = gitlab.client(&config, cancel)?;
                let relay_config = RelayConfig::from(&config);
                if !self.quiet {
                    output::print_heading("Steps");
                }
                let report = Relay::new(&client, &relay_config)
                    .with_progress(!self.quiet)
                    .report(&request)
                    .await?;

                self.write_report(&report)
            }
            Commands::Resolve { gitlab, selection } => {
                gitlab.apply(&mut config);
                if let Some(policy) = selection.playable_policy {
                    config.resolver.playable_policy = policy;
                }

                let project_path = gitlab.project_path()?;
                let ctx = selection.context(&project_path)?;

                let client = gitlab.client(&config, cancel)?;
                let relay_config = RelayConfig::from(&config);
                let report = Relay::new(&client, &relay_config)
                    .with_progress(!self.quiet)
                    .resolve(&ctx, &selection.job)
                    .await?;

                self.write_report(&report)
            }
            Commands::TriggerPipeline {
                gitlab,
                variables,
                ref_,
                trigger_token,
            } => {
                gitlab.apply(&mut config);

                let project_path = gitlab.project_path()?;
                info!("Triggering pipeline for project: {project_path}");

                let trigger_token = Token::from(
                    trigger_token
                        .as_deref()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or(gitlab.token.as_str()),
                );

                let client = gitlab.client(&config, cancel)?;
                let relay_config = RelayConfig::from(&config);
                Relay::new(&client, &relay_config)
                    .with_progress(!self.quiet)
                    .trigger_pipeline(&project_path, &trigger_token, ref_, &variables.variables())
                    .await?;

                Ok(())
            }
        }
    }
}
