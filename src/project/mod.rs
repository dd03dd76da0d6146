//! Projects: a queue bound to an SCM backend and a test trigger
//!
//! The worker and the API only see [`Project`] trait objects held in a
//! [`ProjectRegistry`], which is built once at startup and passed around
//! explicitly.

use crate::config::{Config, ProjectConfig};
use crate::error::{Error, Result};
use crate::queue::QueueHandle;
use crate::scm::{PullRequest, Repo, ScmBackend, create_scm_backend};
use crate::testing::{HttpTestTrigger, PendingTests, RunningTest};
use crate::types::SubmitRequest;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything the reconciler needs to process one project's requests
#[async_trait]
pub trait Project: Send + Sync {
    /// Unique project name
    fn name(&self) -> &str;

    /// The project's submit queue
    fn queue(&self) -> &QueueHandle;

    /// Resolve a repository by name
    fn get_repo(&self, name: &str) -> Result<Box<dyn Repo>>;

    /// Resolve a pull request within a repository
    fn get_pr(&self, repo: &str, number: u64) -> Result<Box<dyn PullRequest>>;

    /// Start a test run for `request`
    async fn test(&self, request: &SubmitRequest) -> Result<RunningTest>;

    /// Runs waiting for a result callback, if the trigger takes callbacks
    fn pending_tests(&self) -> Option<&PendingTests> {
        None
    }
}

/// A project backed by a real SCM backend and an HTTP test trigger
pub struct ConfiguredProject {
    name: String,
    queue: QueueHandle,
    scm: ScmBackend,
    trigger: HttpTestTrigger,
}

impl ConfiguredProject {
    /// Assemble a project from its parts
    pub fn new(name: impl Into<String>, scm: ScmBackend, trigger: HttpTestTrigger) -> Self {
        Self {
            name: name.into(),
            queue: QueueHandle::new(),
            scm,
            trigger,
        }
    }

    /// Build a project from configuration, resolving SCM credentials
    pub async fn from_config(
        config: &ProjectConfig,
        call_timeout: Option<Duration>,
    ) -> Result<Self> {
        let scm = create_scm_backend(&config.scm, call_timeout).await?;
        let trigger = HttpTestTrigger::new(config.test.clone(), call_timeout)?;
        Ok(Self::new(config.name.clone(), scm, trigger))
    }

    /// The SCM backend
    pub const fn scm(&self) -> &ScmBackend {
        &self.scm
    }
}

#[async_trait]
impl Project for ConfiguredProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    fn get_repo(&self, name: &str) -> Result<Box<dyn Repo>> {
        if name.is_empty() {
            return Err(Error::Platform("empty repository name".to_string()));
        }
        Ok(self.scm.repo(name))
    }

    fn get_pr(&self, repo: &str, number: u64) -> Result<Box<dyn PullRequest>> {
        if repo.is_empty() {
            return Err(Error::Platform("empty repository name".to_string()));
        }
        if number == 0 {
            return Err(Error::Platform(format!("invalid pull request number {number}")));
        }
        Ok(self.scm.pull_request(repo, number))
    }

    async fn test(&self, request: &SubmitRequest) -> Result<RunningTest> {
        self.trigger.trigger(request).await
    }

    fn pending_tests(&self) -> Option<&PendingTests> {
        Some(self.trigger.pending())
    }
}

/// All registered projects, keyed by name
#[derive(Clone, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Arc<dyn Project>>,
}

impl ProjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured project
    pub async fn from_config(config: &Config) -> Result<Self> {
        let call_timeout = config.queue.call_timeout();
        let mut registry = Self::new();
        for project in &config.projects {
            let built = ConfiguredProject::from_config(project, call_timeout).await?;
            info!(
                project = %project.name,
                scm = %built.scm().kind(),
                "registered project"
            );
            registry.insert(Arc::new(built))?;
        }
        Ok(registry)
    }

    /// Register a project; names must be unique
    pub fn insert(&mut self, project: Arc<dyn Project>) -> Result<()> {
        let name = project.name().to_string();
        if self.projects.contains_key(&name) {
            return Err(Error::Config(format!("duplicate project '{name}'")));
        }
        self.projects.insert(name, project);
        Ok(())
    }

    /// Look up a project by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Project>> {
        self.projects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
    }

    /// Projects in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Project>> {
        self.projects.values()
    }

    /// Project names in order
    pub fn names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    /// Number of projects
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether no projects are registered
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
