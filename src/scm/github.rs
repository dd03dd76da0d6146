//! GitHub backend implementation

use super::{MergeCandidacy, PullRequest, Repo, api_base};
use crate::config::ScmConfig;
use crate::error::{Error, Result};
use crate::types::{MergeMethod, Sha};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::IssueState;
use octocrab::models::pulls::MergeableState;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_API: &str = "https://api.github.com";

#[derive(Deserialize)]
struct Branch {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
}

/// GitHub client shared by every repo and PR handle of a project
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    branch: String,
    merge_method: MergeMethod,
}

impl GitHubClient {
    /// Create a client for the owner named in `config`
    pub fn new(token: &str, config: &ScmConfig) -> Result<Self> {
        let base = api_base(config.server.as_deref(), DEFAULT_API, "/api/v3");
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(base.as_str())
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            owner: config.project_name.clone(),
            branch: config.branch.clone(),
            merge_method: config.merge_method,
        })
    }

    /// Handle for `owner/repo`
    pub fn repo(&self, repo: &str) -> GitHubRepo {
        GitHubRepo {
            client: self.client.clone(),
            owner: self.owner.clone(),
            repo: repo.to_string(),
            branch: self.branch.clone(),
        }
    }

    /// Handle for `owner/repo#number`
    pub fn pull_request(&self, repo: &str, number: u64) -> GitHubPullRequest {
        GitHubPullRequest {
            client: self.client.clone(),
            owner: self.owner.clone(),
            repo: repo.to_string(),
            number,
            merge_method: self.merge_method,
        }
    }
}

/// A GitHub repository tracking one branch
pub struct GitHubRepo {
    client: Octocrab,
    owner: String,
    repo: String,
    branch: String,
}

#[async_trait]
impl Repo for GitHubRepo {
    fn is_github(&self) -> bool {
        true
    }

    async fn head_sha1(&self) -> Result<Sha> {
        debug!(repo = %self.repo, branch = %self.branch, "fetching branch head");
        let route = format!(
            "/repos/{}/{}/branches/{}",
            self.owner,
            self.repo,
            urlencoding::encode(&self.branch)
        );
        let branch: Branch = self.client.get(route, None::<&()>).await?;

        debug!(repo = %self.repo, sha = %branch.commit.sha, "fetched branch head");
        Ok(Sha::new(branch.commit.sha))
    }
}

/// A GitHub pull request
pub struct GitHubPullRequest {
    client: Octocrab,
    owner: String,
    repo: String,
    number: u64,
    merge_method: MergeMethod,
}

impl GitHubPullRequest {
    async fn fetch(&self) -> Result<octocrab::models::pulls::PullRequest> {
        Ok(self
            .client
            .pulls(&self.owner, &self.repo)
            .get(self.number)
            .await?)
    }
}

#[async_trait]
impl PullRequest for GitHubPullRequest {
    async fn head_sha1(&self) -> Result<Sha> {
        debug!(pr_number = self.number, "fetching PR head");
        let pr = self.fetch().await?;
        Ok(Sha::new(pr.head.sha))
    }

    async fn is_merge_candidate(&self) -> Result<MergeCandidacy> {
        debug!(pr_number = self.number, "checking mergeability");
        let pr = self.fetch().await?;

        // IssueState is non-exhaustive, so anything but Open is "not open"
        if !matches!(pr.state, Some(IssueState::Open)) {
            return Ok(MergeCandidacy::blocked("PR is not open"));
        }
        if pr.draft.unwrap_or(false) {
            return Ok(MergeCandidacy::blocked("PR is a draft"));
        }

        let candidacy = match pr.mergeable {
            None => {
                return Err(Error::MergeabilityUnknown(
                    "GitHub is still computing mergeability".to_string(),
                ));
            }
            Some(false) => MergeCandidacy::blocked(pr.mergeable_state.as_ref().map_or_else(
                || "has merge conflicts".to_string(),
                |state| format!("mergeable state is {}", format!("{state:?}").to_lowercase()),
            )),
            Some(true) if matches!(pr.mergeable_state, Some(MergeableState::Blocked)) => {
                MergeCandidacy::blocked("blocked by branch protection")
            }
            Some(true) => MergeCandidacy::mergeable(),
        };

        debug!(
            pr_number = self.number,
            mergeable = candidacy.mergeable,
            "checked mergeability"
        );
        Ok(candidacy)
    }

    async fn merge(&self, head: &Sha) -> Result<()> {
        debug!(
            pr_number = self.number,
            method = %self.merge_method,
            sha = %head.short(),
            "merging PR"
        );
        let pr = self.fetch().await?;

        let method = match self.merge_method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };
        let title = format!(
            "{} (#{})",
            pr.title.as_deref().unwrap_or_default(),
            self.number
        );

        let result = self
            .client
            .pulls(&self.owner, &self.repo)
            .merge(self.number)
            .method(method)
            .title(title)
            .message("Auto-merge by submitqueue")
            .sha(head.as_str())
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        if !result.merged {
            return Err(Error::MergeRejected(
                result
                    .message
                    .unwrap_or_else(|| "GitHub did not merge the PR".to_string()),
            ));
        }

        debug!(pr_number = self.number, sha = ?result.sha, "merge complete");
        Ok(())
    }
}
