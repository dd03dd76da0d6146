//! Shared test utilities

#![allow(dead_code)]

pub mod mock_project;
pub mod mock_scm;

pub use mock_project::{MockProject, RecordingReporter, TestBehavior};
pub use mock_scm::{MockPullRequest, MockRepo};

use submit_queue::config::{ScmConfig, ScmType, TestTriggerConfig};
use submit_queue::reconcile::ReconcilePolicy;
use submit_queue::types::{MergeMethod, Priority, SubmitRequest};

/// Request for PR `number` of `proj/repo`, submitted at `sha1`
pub fn make_request(number: u64, sha1: &str) -> SubmitRequest {
    SubmitRequest::new("proj", "repo", number, format!("feature-{number}"), sha1)
}

/// Request with an explicit priority and emergency flag
pub fn make_ranked_request(number: u64, priority: Priority, emergency: bool) -> SubmitRequest {
    make_request(number, &format!("pr{number}"))
        .with_priority(priority)
        .with_emergency(emergency)
}

/// GitHub project with repo head `r1` and PR `number` at `sha1`
pub fn github_project(number: u64, sha1: &str) -> (MockProject, MockPullRequest) {
    let project = MockProject::new("proj", MockRepo::github(&["r1"]));
    let pr = project.add_pr(number, MockPullRequest::new(&[sha1]));
    (project, pr)
}

/// Policy with no deadlines
pub fn no_deadlines() -> ReconcilePolicy {
    ReconcilePolicy::default()
}

/// SCM config pointing at a mock server
pub fn scm_config(kind: ScmType, server: &str) -> ScmConfig {
    ScmConfig {
        kind,
        project_name: "acme".to_string(),
        server: Some(server.to_string()),
        branch: "master".to_string(),
        merge_method: MergeMethod::Merge,
        token_env: None,
    }
}

/// Test trigger config pointing at a mock server
pub fn trigger_config(url: &str, body: &str) -> TestTriggerConfig {
    TestTriggerConfig {
        url: url.to_string(),
        method: None,
        headers: [("X-Token".to_string(), "secret".to_string())]
            .into_iter()
            .collect(),
        body: body.to_string(),
        callback: false,
    }
}
