//! Project configuration
//!
//! The project file is TOML unless its extension is `.json`. JSON files
//! using camelCase keys (`projectName`, `testConfig`)
//! are accepted through serde aliases.

use crate::error::{Error, Result};
use crate::types::MergeMethod;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default branch whose head is tracked for each repository
pub const DEFAULT_BRANCH: &str = "master";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_PAUSE_BETWEEN_REQUESTS_MS: u64 = 1000;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Whole configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker and reconciler settings
    #[serde(default)]
    pub queue: QueueSettings,
    /// Submission API settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Configured projects
    #[serde(default, rename = "project", alias = "projects")]
    pub projects: Vec<ProjectConfig>,
}

/// What to do when a PR head moved between submission and processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleSubmissionPolicy {
    /// Report and discard; the operator resubmits deliberately
    #[default]
    Drop,
    /// Requeue a new attempt pinned to the current PR head
    Requeue,
}

/// What to do when a test result does not arrive before the deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestTimeoutPolicy {
    /// Retry on a later pass
    #[default]
    Requeue,
    /// Report and discard
    Drop,
}

/// Worker loop and reconciler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Sleep between polls of an empty queue
    pub poll_interval_secs: u64,
    /// Pause after each processed request
    pub pause_between_requests_ms: u64,
    /// Deadline for each SCM or trigger call; 0 disables
    pub call_timeout_secs: u64,
    /// Deadline for a test result; `None` or 0 waits forever
    pub test_timeout_secs: Option<u64>,
    /// Outcome when the test deadline passes
    pub on_test_timeout: TestTimeoutPolicy,
    /// Outcome when the PR moved since submission
    pub on_stale_submission: StaleSubmissionPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            pause_between_requests_ms: DEFAULT_PAUSE_BETWEEN_REQUESTS_MS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            test_timeout_secs: None,
            on_test_timeout: TestTimeoutPolicy::default(),
            on_stale_submission: StaleSubmissionPolicy::default(),
        }
    }
}

impl QueueSettings {
    /// Idle backoff
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Pause after each request
    pub const fn pause_between_requests(&self) -> Duration {
        Duration::from_millis(self.pause_between_requests_ms)
    }

    /// Per-call deadline, if enabled
    pub const fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Test result deadline, if enabled
    pub const fn test_timeout(&self) -> Option<Duration> {
        match self.test_timeout_secs {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }
}

/// Submission API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the API listens on
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl ServerSettings {
    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address '{}': {e}", self.listen)))
    }
}

/// One project: a queue bound to an SCM backend and a test trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Unique project name
    pub name: String,
    /// Source control backend
    #[serde(alias = "scmConfig")]
    pub scm: ScmConfig,
    /// How tests are requested
    #[serde(alias = "testConfig")]
    pub test: TestTriggerConfig,
}

/// Source control backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmType {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

impl std::fmt::Display for ScmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
        }
    }
}

/// Source control settings for a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmConfig {
    /// Backend type
    #[serde(rename = "type")]
    pub kind: ScmType,
    /// Owner (GitHub) or namespace (GitLab) holding the repositories
    #[serde(alias = "projectName")]
    pub project_name: String,
    /// Custom host; `None` means github.com / gitlab.com
    #[serde(default)]
    pub server: Option<String>,
    /// Branch whose head is tracked
    #[serde(default = "default_branch")]
    pub branch: String,
    /// How pull requests are merged
    #[serde(default, alias = "mergeMethod")]
    pub merge_method: MergeMethod,
    /// Environment variable holding the API token
    #[serde(default, alias = "tokenEnv")]
    pub token_env: Option<String>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

/// HTTP request that starts a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTriggerConfig {
    /// Endpoint URL
    pub url: String,
    /// HTTP method, `POST` when omitted
    #[serde(default)]
    pub method: Option<String>,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body template, see [`crate::testing::render_body`]
    #[serde(default, alias = "bodyTemplate")]
    pub body: String,
    /// Results arrive later through the API instead of in the response
    #[serde(default)]
    pub callback: bool,
}

impl Config {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text; a bare array is read as the project list
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;

        let config: Self = if value.is_array() {
            let projects = serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("invalid project list: {e}")))?;
            Self {
                projects,
                ..Self::default()
            }
        } else {
            serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("invalid config: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_toml(&text)
        }
    }

    /// Check the invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(Error::Config("no projects defined".to_string()));
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(Error::Config("project with empty name".to_string()));
            }
            if !seen.insert(project.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate project '{}'",
                    project.name
                )));
            }
            let scm = &project.scm;
            if scm.kind == ScmType::GitLab && scm.merge_method == MergeMethod::Rebase {
                return Err(Error::Config(format!(
                    "project '{}': merge_method 'rebase' is not supported for GitLab",
                    project.name
                )));
            }
            url::Url::parse(&project.test.url).map_err(|e| {
                Error::Config(format!(
                    "project '{}': invalid test url '{}': {e}",
                    project.name, project.test.url
                ))
            })?;
        }
        Ok(())
    }
}
