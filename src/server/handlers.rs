//! Request handlers for the submission API

use super::AppState;
use crate::project::Project;
use crate::testing::TestResult;
use crate::types::{Priority, SubmitRequest};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors returned to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// No project with this name
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Priority that is neither a number nor P1-P4
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// No test run waiting under this id
    #[error("test run not found: {0}")]
    UnknownTestRun(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProjectNotFound(_) | Self::UnknownTestRun(_) => StatusCode::NOT_FOUND,
            Self::InvalidPriority(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Priority as given by a client: a number or a name like `"P1"`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriorityInput {
    /// Raw numeric priority
    Number(u32),
    /// Named priority
    Name(String),
}

impl PriorityInput {
    fn resolve(&self) -> Result<Priority, ApiError> {
        match self {
            Self::Number(n) => Ok(Priority(*n)),
            Self::Name(name) => name.parse().map_err(ApiError::InvalidPriority),
        }
    }
}

/// Body of `POST /api/v1/projects/{project}/requests`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBody {
    /// Repository name within the project
    pub repo: String,
    /// Pull request number
    pub pr_number: u64,
    /// Source branch of the PR
    pub from_ref: String,
    /// PR head the submitter approved
    pub sha1: String,
    /// Defaults to normal priority
    #[serde(default)]
    pub priority: Option<PriorityInput>,
    /// Emergency requests jump ahead of every priority
    #[serde(default)]
    pub emergency: bool,
}

/// Health check handler
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// List registered project names
pub async fn list_projects_handler(State(app_state): State<AppState>) -> Json<Vec<String>> {
    Json(app_state.registry().names())
}

/// Queue contents in processing order
///
/// Works on a copy, so inspecting a queue never changes whether the live
/// queue is sorted.
pub async fn queue_handler(
    State(app_state): State<AppState>,
    Path(project): Path<String>,
) -> Result<Json<Vec<SubmitRequest>>, ApiError> {
    let project = lookup(&app_state, &project)?;
    Ok(Json(project.queue().snapshot()))
}

/// Enqueue a new submit request
///
/// # Response
///
/// - 202 Accepted with the queued request
/// - 404 Not Found for an unknown project
/// - 400 Bad Request for an invalid priority
pub async fn submit_handler(
    State(app_state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitRequest>), ApiError> {
    let project = lookup(&app_state, &project)?;
    let priority = body
        .priority
        .as_ref()
        .map_or(Ok(Priority::NORMAL), PriorityInput::resolve)?;

    let request = SubmitRequest::new(
        project.name(),
        body.repo,
        body.pr_number,
        body.from_ref,
        body.sha1,
    )
    .with_priority(priority)
    .with_emergency(body.emergency);

    info!(project = project.name(), %request, "request submitted");
    project.queue().enqueue(request.clone());

    Ok((StatusCode::ACCEPTED, Json(request)))
}

/// Deliver the result of a test run started in callback mode
///
/// # Response
///
/// - 200 OK once the waiting run has the result
/// - 404 Not Found for an unknown project or a run nobody is waiting for
pub async fn test_result_handler(
    State(app_state): State<AppState>,
    Path((project, run_id)): Path<(String, String)>,
    Json(result): Json<TestResult>,
) -> Result<StatusCode, ApiError> {
    let project = lookup(&app_state, &project)?;
    let pending = project
        .pending_tests()
        .ok_or_else(|| ApiError::UnknownTestRun(run_id.clone()))?;

    let passed = result.passed;
    if !pending.resolve(&run_id, result) {
        return Err(ApiError::UnknownTestRun(run_id));
    }

    info!(project = project.name(), run_id = %run_id, passed, "test result received");
    Ok(StatusCode::OK)
}

fn lookup(app_state: &AppState, name: &str) -> Result<Arc<dyn Project>, ApiError> {
    app_state
        .registry()
        .get(name)
        .map_err(|_| ApiError::ProjectNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_200_ok() {
        let (status, body) = health_handler().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[test]
    fn priority_input_resolves_names_and_numbers() {
        assert_eq!(PriorityInput::Number(5).resolve().unwrap(), Priority(5));
        assert_eq!(
            PriorityInput::Name("P1".to_string()).resolve().unwrap(),
            Priority::P1
        );
        assert!(matches!(
            PriorityInput::Name("urgent".to_string()).resolve(),
            Err(ApiError::InvalidPriority(_))
        ));
    }
}
