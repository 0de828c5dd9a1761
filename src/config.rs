use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::publisher::{DEFAULT_STATUS_DESCRIPTION, DEFAULT_STATUS_NAME};
use crate::resolver::{PlayablePolicy, RetryPolicy, DEFAULT_PIPELINE_LIMIT};
use crate::trigger::PlayMechanism;

/// Configuration file structure.
///
/// Holds the settings that rarely change between runs of the same Bitrise
/// workflow. Per-build values (commit, outcome, trigger variables) come from
/// the environment instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,

    /// REST API base URL, when it is not `{base-url}/api/v4`
    pub api_url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of pipelines fetched per lookup
    #[serde(default = "default_pipeline_limit")]
    pub pipeline_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusConfig {
    /// Commit status name shown in GitLab
    #[serde(default = "default_status_name")]
    pub name: String,

    #[serde(default = "default_status_description")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    #[serde(default)]
    pub playable_policy: PlayablePolicy,

    /// Retries for the read-only pipeline lookup
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    /// Play the resolved job after a successful build
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub play_mechanism: PlayMechanism,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: default_gitlab_base_url(),
            api_url: None,
            timeout_secs: default_timeout_secs(),
            pipeline_limit: default_pipeline_limit(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            name: default_status_name(),
            description: default_status_description(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            playable_policy: PlayablePolicy::default(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            play_mechanism: PlayMechanism::default(),
        }
    }
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_pipeline_limit() -> usize {
    DEFAULT_PIPELINE_LIMIT
}

fn default_status_name() -> String {
    DEFAULT_STATUS_NAME.to_string()
}

fn default_status_description() -> String {
    DEFAULT_STATUS_DESCRIPTION.to_string()
}

fn default_retries() -> u32 {
    RetryPolicy::default().retries
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

const CANDIDATES: [&str; 4] = [
    "pipeline-relay.toml",
    "pipeline-relay.json",
    "pipeline-relay.yaml",
    "pipeline-relay.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./pipeline-relay.{toml,json,yaml,yml}
    /// 3. `<user config dir>/pipeline-relay/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let user_config =
            dirs::config_dir().map(|dir| dir.join("pipeline-relay").join("config.toml"));

        let found = CANDIDATES
            .iter()
            .map(PathBuf::from)
            .chain(user_config)
            .find(|candidate| candidate.exists());

        match found {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        log::debug!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.resolver.retries,
            delay: Duration::from_millis(self.resolver.retry_delay_ms),
        }
    }
}
