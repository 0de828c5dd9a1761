use std::time::Duration;

use graphql_client::Response as GraphQLResponse;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::Token;
use crate::error::{HostError, RelayError};

const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
pub(super) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a request changes state on the host.
///
/// A mutating request that is interrupted after it left the process may
/// still have been applied, so it is reported as an unknown outcome rather
/// than as a plain failure.
#[derive(Debug, Clone, Copy)]
pub(super) enum Effect {
    ReadOnly,
    Mutating(&'static str),
}

impl Effect {
    fn interrupted(self) -> HostError {
        match self {
            Self::ReadOnly => HostError::Cancelled,
            Self::Mutating(operation) => HostError::OutcomeUnknown {
                operation: operation.to_string(),
            },
        }
    }

    fn transport_error(self, error: &reqwest::Error) -> HostError {
        let never_sent = error.is_connect() || error.is_builder();
        match self {
            Self::Mutating(operation) if !never_sent => HostError::OutcomeUnknown {
                operation: format!("{operation} ({error})"),
            },
            _ => HostError::Transport(error.to_string()),
        }
    }
}

pub struct GitLabClient {
    client: Client,
    pub graphql_url: Url,
    pub api_url: Url,
    token: Token,
    timeout: Duration,
    cancel: CancellationToken,
}

impl GitLabClient {
    /// Builds a client for a GitLab instance.
    ///
    /// `api_url` overrides the REST base (defaults to `{base_url}/api/v4/`);
    /// GraphQL always lives at `{base_url}/api/graphql`.
    pub fn new(base_url: &str, api_url: Option<&str>, token: Token) -> Result<Self, RelayError> {
        let client = Client::builder()
            .user_agent(concat!("pipeline-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        let base = Url::parse(base_url)
            .map_err(|e| RelayError::Configuration(format!("Invalid base URL: {e}")))?;

        let graphql_url = base
            .join("api/graphql")
            .map_err(|e| RelayError::Configuration(format!("Invalid GraphQL URL: {e}")))?;

        let api_url = match api_url {
            Some(api_url) => Url::parse(&with_trailing_slash(api_url))
                .map_err(|e| RelayError::Configuration(format!("Invalid API base URL: {e}")))?,
            None => base
                .join("api/v4/")
                .map_err(|e| RelayError::Configuration(format!("Invalid API base URL: {e}")))?,
        };

        Ok(Self {
            client,
            graphql_url,
            api_url,
            token,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Construct project base URL
    pub fn project_url(&self, project_path: &str) -> Result<Url, HostError> {
        self.api_url
            .join(&format!("projects/{}/", urlencoding::encode(project_path)))
            .map_err(|e| HostError::InvalidUrl(format!("project URL: {e}")))
    }

    pub(super) fn rest_request(&self, url: Url) -> RequestBuilder {
        self.client
            .post(url)
            .header(PRIVATE_TOKEN_HEADER, self.token.as_str())
    }

    /// Sends a request once and returns the body of a 2xx response.
    pub(super) async fn send(
        &self,
        request: RequestBuilder,
        effect: Effect,
    ) -> Result<String, HostError> {
        if self.cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }

        let request = request.timeout(self.timeout);

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(effect.interrupted()),
            result = request.send() => result.map_err(|e| effect.transport_error(&e))?,
        };

        let status = response.status();

        if !status.is_success() {
            // The status line already settles the rejection; the body is
            // only detail and may be lost to an interruption.
            let body = tokio::select! {
                biased;
                () = self.cancel.cancelled() => String::new(),
                result = response.text() => result.unwrap_or_default(),
            };
            return Err(HostError::Http {
                status: status.as_u16(),
                body,
            });
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(effect.interrupted()),
            result = response.text() => result.map_err(|e| effect.transport_error(&e)),
        }
    }

    /// Execute a GraphQL request and return its data after checking for errors
    pub(super) async fn execute_graphql_request<T>(
        &self,
        request_body: &impl Serialize,
        effect: Effect,
    ) -> Result<T, HostError>
    where
        T: DeserializeOwned,
    {
        debug!("POST {}", self.graphql_url);

        let request = self
            .client
            .post(self.graphql_url.clone())
            .bearer_auth(self.token.as_str())
            .json(request_body);

        let body = self.send(request, effect).await?;

        let response_body: GraphQLResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(HostError::MalformedResponse {
                    reason: e.to_string(),
                    body,
                })
            }
        };

        if let Some(errors) = response_body.errors.filter(|errors| !errors.is_empty()) {
            return Err(HostError::GraphQl(
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }

        response_body.data.ok_or(HostError::MalformedResponse {
            reason: "GraphQL response contained no data".to_string(),
            body,
        })
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
