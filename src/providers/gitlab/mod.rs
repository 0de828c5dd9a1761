pub mod client;
pub mod links;
mod repository;
mod types;

pub use client::{CommitStatusUpdate, GitLabClient};
pub use repository::project_path_from_repository_url;
pub use types::{GlobalId, Job, JobStatus, Pipeline, PipelineGraph};
