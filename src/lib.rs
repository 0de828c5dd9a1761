//! Relay a Bitrise build result to GitLab.
//!
//! Resolves the downstream GitLab job for a commit, branch or merge request,
//! publishes the build result as a commit status on its pipeline and, when
//! the build succeeded, plays that job.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod output;
pub mod providers;
pub mod publisher;
pub mod relay;
pub mod report;
pub mod resolver;
pub mod status;
pub mod trigger;

#[cfg(test)]
mod testing;
