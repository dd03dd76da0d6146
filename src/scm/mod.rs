//! Source control backends for GitHub and GitLab
//!
//! The reconciler only sees the [`Repo`] and [`PullRequest`] traits, so the
//! same protocol runs against either platform (or an in-memory fake).

mod github;
mod gitlab;

pub use github::{GitHubClient, GitHubPullRequest, GitHubRepo};
pub use gitlab::{GitLabClient, GitLabPullRequest, GitLabRepo};

use crate::auth::get_auth;
use crate::config::{ScmConfig, ScmType};
use crate::error::Result;
use crate::types::Sha;
use async_trait::async_trait;
use std::time::Duration;

/// A repository whose target branch head can be read
#[async_trait]
pub trait Repo: Send + Sync {
    /// Whether the backend tracks commit identity strictly
    ///
    /// When true, a PR whose head moved since submission is rejected before
    /// testing starts.
    fn is_github(&self) -> bool;

    /// Current head of the tracked branch
    async fn head_sha1(&self) -> Result<Sha>;
}

/// Answer to "can this PR be merged right now?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidacy {
    /// Whether the backend would accept a merge
    pub mergeable: bool,
    /// Why not, when `mergeable` is false
    pub reason: String,
}

impl MergeCandidacy {
    /// A mergeable PR
    pub const fn mergeable() -> Self {
        Self {
            mergeable: true,
            reason: String::new(),
        }
    }

    /// A PR that cannot be merged, with the reason
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            mergeable: false,
            reason: reason.into(),
        }
    }
}

/// A pull request (or merge request) that may be merged
#[async_trait]
pub trait PullRequest: Send + Sync {
    /// Current head commit of the PR
    async fn head_sha1(&self) -> Result<Sha>;

    /// Whether the PR can currently be merged
    async fn is_merge_candidate(&self) -> Result<MergeCandidacy>;

    /// Merge the PR into its target branch
    ///
    /// The backend refuses the merge if the PR head is no longer `head`.
    async fn merge(&self, head: &Sha) -> Result<()>;
}

/// A configured backend that hands out repo and PR handles
#[derive(Clone)]
pub enum ScmBackend {
    /// GitHub via octocrab
    GitHub(GitHubClient),
    /// GitLab via reqwest
    GitLab(GitLabClient),
}

impl ScmBackend {
    /// Handle for a repository
    pub fn repo(&self, name: &str) -> Box<dyn Repo> {
        match self {
            Self::GitHub(client) => Box::new(client.repo(name)),
            Self::GitLab(client) => Box::new(client.repo(name)),
        }
    }

    /// Handle for a pull request
    pub fn pull_request(&self, repo: &str, number: u64) -> Box<dyn PullRequest> {
        match self {
            Self::GitHub(client) => Box::new(client.pull_request(repo, number)),
            Self::GitLab(client) => Box::new(client.pull_request(repo, number)),
        }
    }

    /// Backend type
    pub const fn kind(&self) -> ScmType {
        match self {
            Self::GitHub(_) => ScmType::GitHub,
            Self::GitLab(_) => ScmType::GitLab,
        }
    }
}

/// Build the backend described by `config`, resolving its token
pub async fn create_scm_backend(
    config: &ScmConfig,
    timeout: Option<Duration>,
) -> Result<ScmBackend> {
    let auth = get_auth(
        config.kind,
        config.token_env.as_deref(),
        config.server.as_deref(),
    )
    .await?;

    match config.kind {
        ScmType::GitHub => Ok(ScmBackend::GitHub(GitHubClient::new(&auth.token, config)?)),
        ScmType::GitLab => Ok(ScmBackend::GitLab(GitLabClient::new(auth.token, config, timeout)?)),
    }
}

/// Base API URL for a configured server
///
/// A server given with a scheme is used verbatim, which also lets tests
/// point a backend at a local mock server.
pub(crate) fn api_base(server: Option<&str>, default: &str, path: &str) -> String {
    match server {
        Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
            s.trim_end_matches('/').to_string()
        }
        Some(host) => format!("https://{}{path}", host.trim_end_matches('/')),
        None => default.to_string(),
    }
}
