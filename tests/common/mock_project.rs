//! Mock project and reporter for testing

#![allow(dead_code)]

use super::mock_scm::{MockPullRequest, MockRepo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use submit_queue::error::{Error, Result};
use submit_queue::project::Project;
use submit_queue::queue::QueueHandle;
use submit_queue::report::Reporter;
use submit_queue::scm::{PullRequest, Repo};
use submit_queue::testing::{PendingTests, RunningTest, TestResult, TestResultSender};
use submit_queue::types::SubmitRequest;

/// What `Project::test` does when called
#[derive(Debug, Clone)]
pub enum TestBehavior {
    /// Resolve immediately with this result
    Resolve(TestResult),
    /// Fail to start the run
    TriggerError(String),
    /// Start a run that never resolves
    Hang,
    /// Start a run that waits for a result through `pending_tests`
    Callback,
}

/// Mock project with one repo and any number of PRs
///
/// Features:
/// - Scripted repo and PR heads (see `MockRepo`, `MockPullRequest`)
/// - Configurable test behavior
/// - Call tracking for `test`
/// - Error injection for repo/PR resolution
pub struct MockProject {
    name: String,
    queue: QueueHandle,
    repo: MockRepo,
    prs: Mutex<HashMap<u64, MockPullRequest>>,
    test_behavior: Mutex<TestBehavior>,
    test_calls: Mutex<Vec<SubmitRequest>>,
    // Senders of hung runs, kept alive so the runs never resolve
    hung: Mutex<Vec<TestResultSender>>,
    error_on_get_repo: Mutex<Option<String>>,
    pending: PendingTests,
    run_ids: Mutex<Vec<String>>,
}

impl MockProject {
    /// Create a project around `repo` whose tests pass
    pub fn new(name: &str, repo: MockRepo) -> Self {
        Self {
            name: name.to_string(),
            queue: QueueHandle::new(),
            repo,
            prs: Mutex::new(HashMap::new()),
            test_behavior: Mutex::new(TestBehavior::Resolve(TestResult::passed())),
            test_calls: Mutex::new(Vec::new()),
            hung: Mutex::new(Vec::new()),
            error_on_get_repo: Mutex::new(None),
            pending: PendingTests::new(),
            run_ids: Mutex::new(Vec::new()),
        }
    }

    /// Register a PR; returns a handle sharing its state
    pub fn add_pr(&self, number: u64, pr: MockPullRequest) -> MockPullRequest {
        self.prs.lock().unwrap().insert(number, pr.clone());
        pr
    }

    /// The project's repo handle
    pub const fn repo(&self) -> &MockRepo {
        &self.repo
    }

    /// Change what `test` does
    pub fn set_test_behavior(&self, behavior: TestBehavior) {
        *self.test_behavior.lock().unwrap() = behavior;
    }

    /// Make `get_repo` return an error
    pub fn fail_get_repo(&self, msg: &str) {
        *self.error_on_get_repo.lock().unwrap() = Some(msg.to_string());
    }

    /// PR numbers passed to `test`, in call order
    pub fn tested_prs(&self) -> Vec<u64> {
        self.test_calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.pull_request_number)
            .collect()
    }

    /// Ids of runs started with `TestBehavior::Callback`, in call order
    pub fn run_ids(&self) -> Vec<String> {
        self.run_ids.lock().unwrap().clone()
    }

    /// Number of `test` calls so far
    pub fn test_calls(&self) -> usize {
        self.test_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Project for MockProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    fn get_repo(&self, _name: &str) -> Result<Box<dyn Repo>> {
        if let Some(msg) = self.error_on_get_repo.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }
        Ok(Box::new(self.repo.clone()))
    }

    fn get_pr(&self, repo: &str, number: u64) -> Result<Box<dyn PullRequest>> {
        self.prs
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .map(|pr| Box::new(pr) as Box<dyn PullRequest>)
            .ok_or_else(|| Error::Platform(format!("no PR {repo}#{number}")))
    }

    async fn test(&self, request: &SubmitRequest) -> Result<RunningTest> {
        self.test_calls.lock().unwrap().push(request.clone());
        let behavior = self.test_behavior.lock().unwrap().clone();
        match behavior {
            TestBehavior::Resolve(result) => Ok(RunningTest::resolved(result)),
            TestBehavior::TriggerError(msg) => Err(Error::TestTrigger(msg)),
            TestBehavior::Hang => {
                let (sender, running) = RunningTest::channel();
                self.hung.lock().unwrap().push(sender);
                Ok(running)
            }
            TestBehavior::Callback => {
                let (id, running) = self.pending.register(request);
                self.run_ids.lock().unwrap().push(id);
                Ok(running)
            }
        }
    }

    fn pending_tests(&self) -> Option<&PendingTests> {
        Some(&self.pending)
    }
}

/// Reporter that records every message
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(SubmitRequest, String)>>,
}

impl RecordingReporter {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported messages in order
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// PR numbers of reported requests in order
    pub fn reported_prs(&self) -> Vec<u64> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.pull_request_number)
            .collect()
    }

    /// Number of reports so far
    pub fn len(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, request: &SubmitRequest, message: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((request.clone(), message.to_string()));
    }
}
