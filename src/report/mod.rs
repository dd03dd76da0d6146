//! Outcome reporting

use crate::types::SubmitRequest;
use tracing::info;

/// Sink for human-readable processing outcomes
///
/// Reporting is fire-and-forget: implementations must not fail or block
/// the worker.
pub trait Reporter: Send + Sync {
    /// Record `message` against `request`
    fn report(&self, request: &SubmitRequest, message: &str);
}

/// Reporter that writes every outcome to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, request: &SubmitRequest, message: &str) {
        info!(
            project = %request.project_name,
            repo = %request.repo_name,
            pr = request.pull_request_number,
            sha = %request.sha1.short(),
            "{message}"
        );
    }
}
