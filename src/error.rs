//! Error types for submit-queue

use std::time::Duration;
use thiserror::Error;

/// Errors raised by collaborators of the submit queue
///
/// None of these cross the worker boundary: the reconciler maps every
/// variant onto a requeue or drop outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// GitHub API returned an error or an unexpected response
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API returned an error or an unexpected response
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Generic SCM backend failure
    #[error("platform error: {0}")]
    Platform(String),

    /// The backend has not finished computing mergeability yet
    #[error("mergeability unknown: {0}")]
    MergeabilityUnknown(String),

    /// The merge call returned without merging
    #[error("merge rejected: {0}")]
    MergeRejected(String),

    /// Missing or unusable credentials
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    Config(String),

    /// No project with this name is registered
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Test request body could not be rendered
    #[error("template error: {0}")]
    Template(String),

    /// The test trigger rejected the request
    #[error("test trigger error: {0}")]
    TestTrigger(String),

    /// A collaborator call did not finish before its deadline
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
        /// The deadline that passed
        elapsed: Duration,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// octocrab failure
    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bug or unexpected state
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
