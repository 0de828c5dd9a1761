use graphql_client::GraphQLQuery;
use log::debug;
use serde::Serialize;

use super::core::{Effect, GitLabClient};
use crate::auth::Token;
use crate::error::HostError;
use crate::providers::gitlab::types::GlobalId;
use crate::trigger::TriggerVariables;

pub type CiProcessableID = String;
pub type JobID = String;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "src/providers/gitlab/client/schema.graphql",
    query_path = "src/providers/gitlab/client/jobs.graphql",
    response_derives = "Debug,PartialEq,Clone"
)]
pub struct PlayJob;

#[derive(Debug, Serialize)]
struct JobVariableAttribute<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct PlayJobBody<'a> {
    job_variables_attributes: Vec<JobVariableAttribute<'a>>,
}

impl GitLabClient {
    /// Starts a new pipeline for `ref_` through the pipeline trigger API.
    ///
    /// The trigger variables are sent as `variables[KEY]=VALUE` form fields.
    pub async fn trigger_pipeline(
        &self,
        project_path: &str,
        trigger_token: &Token,
        ref_: &str,
        variables: &TriggerVariables,
    ) -> Result<(), HostError> {
        let url = self
            .project_url(project_path)?
            .join("trigger/pipeline")
            .map_err(|e| HostError::InvalidUrl(format!("trigger URL: {e}")))?;

        debug!("POST {url} (ref {ref_})");

        let mut form = vec![
            ("token".to_string(), trigger_token.as_str().to_string()),
            ("ref".to_string(), ref_.to_string()),
        ];
        form.extend(
            variables
                .entries()
                .into_iter()
                .map(|(key, value)| (format!("variables[{key}]"), value.to_string())),
        );

        self.send(self.rest_request(url).form(&form), Effect::Mutating("pipeline trigger"))
            .await?;

        Ok(())
    }

    /// Plays a manual job through `POST /projects/:id/jobs/:job_id/play`.
    pub async fn play_job_rest(
        &self,
        project_path: &str,
        job: &GlobalId,
        variables: &TriggerVariables,
    ) -> Result<(), HostError> {
        let url = self
            .project_url(project_path)?
            .join(&format!("jobs/{}/play", job.numeric))
            .map_err(|e| HostError::InvalidUrl(format!("job URL: {e}")))?;

        debug!("POST {url}");

        let body = PlayJobBody {
            job_variables_attributes: variables
                .entries()
                .into_iter()
                .map(|(key, value)| JobVariableAttribute { key, value })
                .collect(),
        };

        self.send(self.rest_request(url).json(&body), Effect::Mutating("job play"))
            .await?;

        Ok(())
    }

    /// Plays a manual job through the `jobPlay` GraphQL mutation.
    pub async fn play_job_graphql(
        &self,
        job: &GlobalId,
        variables: &TriggerVariables,
    ) -> Result<(), HostError> {
        let request_variables = play_job::Variables {
            id: job.gid.clone(),
            variables: Some(
                variables
                    .entries()
                    .into_iter()
                    .map(|(key, value)| play_job::CiVariableInput {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            ),
        };

        let request_body = PlayJob::build_query(request_variables);

        let data: play_job::ResponseData = self
            .execute_graphql_request(&request_body, Effect::Mutating("job play"))
            .await?;

        let payload = data.job_play.ok_or_else(|| HostError::MalformedResponse {
            reason: "jobPlay returned no payload".to_string(),
            body: String::new(),
        })?;

        if !payload.errors.is_empty() {
            return Err(HostError::GraphQl(payload.errors.join(", ")));
        }

        if let Some(job) = payload.job {
            debug!("jobPlay accepted {:?} (status {:?})", job.id, job.status);
        }

        Ok(())
    }
}
