use std::fmt;

use thiserror::Error;

/// Failures talking to the GitLab API.
///
/// Raw `reqwest` errors never leave the client; they are folded into one of
/// these variants together with whatever the host sent back.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("transport failure, no response received: {0}")]
    Transport(String),

    #[error("GitLab API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response ({reason}): {body}")]
    MalformedResponse { reason: String, body: String },

    #[error("GitLab GraphQL errors: {0}")]
    GraphQl(String),

    #[error(
        "outcome of {operation} is unknown: the request was sent but no response was observed"
    )]
    OutcomeUnknown { operation: String },

    #[error("request cancelled before it was sent")]
    Cancelled,

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    /// A request URL could not be built from the configured base URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl HostError {
    /// Whether a read-only request failing this way is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The step of a run an error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Publish,
    Trigger,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Publish => "publish status",
            Self::Trigger => "trigger",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("No job named '{job}' found for {context}")]
    NotFound { job: String, context: String },

    #[error("{stage} failed: {source}")]
    Host {
        stage: Stage,
        #[source]
        source: HostError,
    },

    #[error("Trigger precondition failed: {0}")]
    Precondition(String),
}

impl RelayError {
    pub fn host(stage: Stage) -> impl FnOnce(HostError) -> Self {
        move |source| Self::Host { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
