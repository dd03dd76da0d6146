//! GitLab backend implementation

use super::{MergeCandidacy, PullRequest, Repo, api_base};
use crate::config::ScmConfig;
use crate::error::{Error, Result};
use crate::types::{MergeMethod, Sha};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API: &str = "https://gitlab.com/api/v4";

#[derive(Deserialize)]
struct Branch {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    id: String,
}

/// MR fields needed for reconciliation
#[derive(Deserialize)]
struct MergeRequestDetails {
    sha: String,
    state: String, // "opened", "closed", "merged", "locked"
    #[serde(default)]
    draft: bool,
    merge_status: String, // "can_be_merged", "cannot_be_merged", "unchecked", ...
}

/// Merge response
#[derive(Deserialize)]
struct MergeResponse {
    state: String,
    merge_commit_sha: Option<String>,
}

struct GitLabApi {
    http: Client,
    token: String,
    api_base: String,
    namespace: String,
    branch: String,
    merge_method: MergeMethod,
}

impl GitLabApi {
    fn project_url(&self, repo: &str, path: &str) -> String {
        let project = format!("{}/{}", self.namespace, repo);
        format!(
            "{}/projects/{}{path}",
            self.api_base,
            urlencoding::encode(&project)
        )
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        Ok(self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await?)
    }
}

/// GitLab client shared by every repo and MR handle of a project
#[derive(Clone)]
pub struct GitLabClient {
    api: Arc<GitLabApi>,
}

impl GitLabClient {
    /// Create a client for the namespace named in `config`
    ///
    /// GitLab's merge endpoint cannot rebase, so `merge_method = "rebase"`
    /// is a configuration error here.
    pub fn new(token: String, config: &ScmConfig, timeout: Option<Duration>) -> Result<Self> {
        if config.merge_method == MergeMethod::Rebase {
            return Err(Error::Config(
                "merge_method 'rebase' is not supported for GitLab".to_string(),
            ));
        }

        let mut builder = Client::builder().user_agent("submit-queue");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api: Arc::new(GitLabApi {
                http,
                token,
                api_base: api_base(config.server.as_deref(), DEFAULT_API, "/api/v4"),
                namespace: config.project_name.clone(),
                branch: config.branch.clone(),
                merge_method: config.merge_method,
            }),
        })
    }

    /// Handle for `namespace/repo`
    pub fn repo(&self, repo: &str) -> GitLabRepo {
        GitLabRepo {
            api: Arc::clone(&self.api),
            repo: repo.to_string(),
        }
    }

    /// Handle for `namespace/repo!iid`
    pub fn pull_request(&self, repo: &str, iid: u64) -> GitLabPullRequest {
        GitLabPullRequest {
            api: Arc::clone(&self.api),
            repo: repo.to_string(),
            iid,
        }
    }
}

/// A GitLab project tracking one branch
pub struct GitLabRepo {
    api: Arc<GitLabApi>,
    repo: String,
}

#[async_trait]
impl Repo for GitLabRepo {
    fn is_github(&self) -> bool {
        false
    }

    async fn head_sha1(&self) -> Result<Sha> {
        debug!(repo = %self.repo, branch = %self.api.branch, "fetching branch head");
        let url = self.api.project_url(
            &self.repo,
            &format!(
                "/repository/branches/{}",
                urlencoding::encode(&self.api.branch)
            ),
        );
        let branch: Branch = self.api.get(&url).await?;
        Ok(Sha::new(branch.commit.id))
    }
}

/// A GitLab merge request
pub struct GitLabPullRequest {
    api: Arc<GitLabApi>,
    repo: String,
    iid: u64,
}

impl GitLabPullRequest {
    async fn details(&self) -> Result<MergeRequestDetails> {
        let url = self
            .api
            .project_url(&self.repo, &format!("/merge_requests/{}", self.iid));
        self.api.get(&url).await
    }
}

#[async_trait]
impl PullRequest for GitLabPullRequest {
    async fn head_sha1(&self) -> Result<Sha> {
        debug!(mr_iid = self.iid, "fetching MR head");
        Ok(Sha::new(self.details().await?.sha))
    }

    async fn is_merge_candidate(&self) -> Result<MergeCandidacy> {
        debug!(mr_iid = self.iid, "checking mergeability");
        let mr = self.details().await?;

        if mr.state != "opened" {
            return Ok(MergeCandidacy::blocked(format!("MR is {}", mr.state)));
        }
        if mr.draft {
            return Ok(MergeCandidacy::blocked("MR is a draft"));
        }

        match mr.merge_status.as_str() {
            "can_be_merged" => Ok(MergeCandidacy::mergeable()),
            "cannot_be_merged" | "cannot_be_merged_recheck" => {
                Ok(MergeCandidacy::blocked("has merge conflicts"))
            }
            other => Err(Error::MergeabilityUnknown(format!(
                "GitLab merge status is '{other}'"
            ))),
        }
    }

    async fn merge(&self, head: &Sha) -> Result<()> {
        debug!(
            mr_iid = self.iid,
            method = %self.api.merge_method,
            sha = %head.short(),
            "merging MR"
        );
        let url = self
            .api
            .project_url(&self.repo, &format!("/merge_requests/{}/merge", self.iid));

        let body = match self.api.merge_method {
            MergeMethod::Squash => serde_json::json!({ "sha": head.as_str(), "squash": true }),
            MergeMethod::Merge | MergeMethod::Rebase => serde_json::json!({ "sha": head.as_str() }),
        };

        let response: MergeResponse = self
            .api
            .http
            .put(&url)
            .header("PRIVATE-TOKEN", &self.api.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(format!("Merge failed: {e}")))?
            .json()
            .await?;

        if response.state != "merged" {
            return Err(Error::MergeRejected(format!(
                "MR state is '{}' after merge",
                response.state
            )));
        }

        debug!(mr_iid = self.iid, sha = ?response.merge_commit_sha, "merge complete");
        Ok(())
    }
}
