//! Reconciliation of one submit request
//!
//! A request walks through five stages:
//!
//! 1. **Fetch baseline**: read the branch head and the PR head
//! 2. **Mergeability**: ask the backend whether the PR can merge
//! 3. **Test**: start a test run and wait for its result
//! 4. **Revalidate**: read both heads again and compare with the baseline
//! 5. **Merge**
//!
//! Each stage either advances or ends the request. Transient failures
//! (network errors, a head that moved while testing) put the request back
//! on the queue. Semantic failures (not mergeable, tests failed, merge
//! refused) discard it. Merging only happens if nothing moved between the
//! baseline and the revalidation, which is what makes tested == merged.

use crate::config::{QueueSettings, StaleSubmissionPolicy, TestTimeoutPolicy};
use crate::error::{Error, Result};
use crate::project::Project;
use crate::report::Reporter;
use crate::types::{Sha, SubmitRequest};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reported when a request is merged
pub const MERGED_MESSAGE: &str = "pr automatically merged!";
/// Reported when either head moved while tests ran
pub const CHANGED_WHILE_TESTING: &str = "PR changed while being tested and has been re-scheduled";
/// Reported when the PR moved since submission and the request is dropped
pub const STALE_DROPPED: &str = "PR updated; re-queue when ready";
/// Reported when the PR moved since submission and the request is requeued
pub const STALE_REQUEUED: &str = "PR updated since submission; requeued at new head";

/// Knobs that change how stages end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePolicy {
    /// Deadline for each SCM or trigger call
    pub call_timeout: Option<Duration>,
    /// Deadline for a test result
    pub test_timeout: Option<Duration>,
    /// Outcome when the test deadline passes
    pub on_test_timeout: TestTimeoutPolicy,
    /// Outcome when the PR moved since submission
    pub on_stale_submission: StaleSubmissionPolicy,
}

impl From<&QueueSettings> for ReconcilePolicy {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            call_timeout: settings.call_timeout(),
            test_timeout: settings.test_timeout(),
            on_test_timeout: settings.on_test_timeout,
            on_stale_submission: settings.on_stale_submission,
        }
    }
}

/// How processing a request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The PR was merged
    Merged,
    /// The request went back on the queue
    Requeued {
        /// Reported message
        reason: String,
    },
    /// The request was discarded
    Dropped {
        /// Reported message
        reason: String,
    },
}

impl Outcome {
    /// The message reported for this outcome
    pub fn message(&self) -> &str {
        match self {
            Self::Merged => MERGED_MESSAGE,
            Self::Requeued { reason } | Self::Dropped { reason } => reason,
        }
    }

    /// Whether the request went back on the queue
    pub const fn is_requeued(&self) -> bool {
        matches!(self, Self::Requeued { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merged => write!(f, "merged"),
            Self::Requeued { reason } => write!(f, "requeued: {reason}"),
            Self::Dropped { reason } => write!(f, "dropped: {reason}"),
        }
    }
}

/// Terminal step of the state machine, before side effects
enum Step {
    Merged,
    /// Requeue the original request
    Requeue(String),
    /// Requeue a replacement request
    Replace(SubmitRequest, String),
    Drop(String),
}

/// Process one request end to end
///
/// Requeues go back onto `project`'s queue and every outcome is reported
/// exactly once through `reporter`.
pub async fn process_request(
    request: SubmitRequest,
    project: &dyn Project,
    reporter: &dyn Reporter,
    policy: &ReconcilePolicy,
) -> Outcome {
    debug!(project = project.name(), %request, "processing request");

    let outcome = match reconcile(&request, project, policy).await {
        Step::Merged => Outcome::Merged,
        Step::Requeue(reason) => {
            project.queue().enqueue(request.clone());
            Outcome::Requeued { reason }
        }
        Step::Replace(replacement, reason) => {
            project.queue().enqueue(replacement);
            Outcome::Requeued { reason }
        }
        Step::Drop(reason) => Outcome::Dropped { reason },
    };

    info!(project = project.name(), %request, %outcome, "request processed");
    reporter.report(&request, outcome.message());
    outcome
}

/// Run `call`, failing with [`Error::Timeout`] once `limit` passes
async fn bounded<T>(
    operation: &'static str,
    limit: Option<Duration>,
    call: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(Error::Timeout {
                operation,
                elapsed: limit,
            })),
        None => call.await,
    }
}

async fn reconcile(
    request: &SubmitRequest,
    project: &dyn Project,
    policy: &ReconcilePolicy,
) -> Step {
    let repo = match project.get_repo(&request.repo_name) {
        Ok(repo) => repo,
        Err(e) => return Step::Drop(format!("error trying to process merge: {e}")),
    };
    let pr = match project.get_pr(&request.repo_name, request.pull_request_number) {
        Ok(pr) => pr,
        Err(e) => return Step::Drop(format!("error trying to process merge: {e}")),
    };

    // Fetch baseline
    let repo_head = match bounded("repo head fetch", policy.call_timeout, repo.head_sha1()).await {
        Ok(sha) => sha,
        Err(e) => {
            warn!(error = %e, repo = %request.repo_name, "repo head fetch failed");
            return Step::Requeue("unable to fetch repo's SHA1".to_string());
        }
    };
    let pr_head = match bounded("PR head fetch", policy.call_timeout, pr.head_sha1()).await {
        Ok(sha) => sha,
        Err(e) => {
            warn!(error = %e, pr = request.pull_request_number, "PR head fetch failed");
            return Step::Requeue("unable to fetch PR's SHA1".to_string());
        }
    };
    debug!(repo_head = %repo_head.short(), pr_head = %pr_head.short(), "baseline");

    if repo.is_github() && pr_head != request.sha1 {
        return stale_submission(request, pr_head, policy.on_stale_submission);
    }

    // Mergeability
    match bounded("mergeability check", policy.call_timeout, pr.is_merge_candidate()).await {
        Ok(candidacy) if candidacy.mergeable => {}
        Ok(candidacy) => {
            return Step::Drop(format!("unable to automatically merge pr: {}", candidacy.reason));
        }
        Err(e) => {
            warn!(error = %e, pr = request.pull_request_number, "mergeability check failed");
            return Step::Requeue("unable to determine if PR is mergeable".to_string());
        }
    }

    // Test
    let running = match bounded("test request", policy.call_timeout, project.test(request)).await {
        Ok(running) => running,
        Err(e) => return Step::Requeue(format!("error requesting tests: {e}")),
    };
    let result = match policy.test_timeout {
        Some(deadline) => match running.wait_for(deadline).await {
            Ok(result) => result,
            Err(e) => return test_timed_out(&e.to_string(), policy.on_test_timeout),
        },
        None => running.wait().await,
    };
    if !result.passed {
        return Step::Drop(format!(
            "failed to automatically merge; tests failed: {}",
            result.error_message()
        ));
    }

    // Revalidate
    let repo_now = match bounded("repo head fetch", policy.call_timeout, repo.head_sha1()).await {
        Ok(sha) => sha,
        Err(e) => {
            warn!(error = %e, repo = %request.repo_name, "repo head revalidation failed");
            return Step::Requeue("unable to fetch repo's SHA1".to_string());
        }
    };
    let pr_now = match bounded("PR head fetch", policy.call_timeout, pr.head_sha1()).await {
        Ok(sha) => sha,
        Err(e) => {
            warn!(error = %e, pr = request.pull_request_number, "PR head revalidation failed");
            return Step::Requeue("unable to fetch PR's SHA1".to_string());
        }
    };
    if repo_now != repo_head || pr_now != pr_head {
        debug!(
            repo_before = %repo_head.short(),
            repo_after = %repo_now.short(),
            pr_before = %pr_head.short(),
            pr_after = %pr_now.short(),
            "heads moved during testing"
        );
        return Step::Requeue(CHANGED_WHILE_TESTING.to_string());
    }

    // Merge exactly what was tested
    match bounded("merge", policy.call_timeout, pr.merge(&pr_head)).await {
        Ok(()) => Step::Merged,
        Err(e) => Step::Drop(format!("error when trying to merge PR: {e}")),
    }
}

fn stale_submission(request: &SubmitRequest, pr_head: Sha, policy: StaleSubmissionPolicy) -> Step {
    match policy {
        StaleSubmissionPolicy::Drop => Step::Drop(STALE_DROPPED.to_string()),
        StaleSubmissionPolicy::Requeue => {
            let mut replacement = request.clone();
            replacement.sha1 = pr_head;
            Step::Replace(replacement, STALE_REQUEUED.to_string())
        }
    }
}

fn test_timed_out(detail: &str, policy: TestTimeoutPolicy) -> Step {
    match policy {
        TestTimeoutPolicy::Requeue => Step::Requeue(format!("{detail}; PR has been re-scheduled")),
        TestTimeoutPolicy::Drop => Step::Drop(format!("failed to automatically merge; {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        };
        let err = bounded("slow call", Some(Duration::from_secs(1)), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "slow call", .. }));
    }

    #[tokio::test]
    async fn test_bounded_without_limit() {
        let value = bounded("quick", None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = QueueSettings {
            test_timeout_secs: Some(90),
            on_stale_submission: StaleSubmissionPolicy::Requeue,
            ..QueueSettings::default()
        };
        let policy = ReconcilePolicy::from(&settings);
        assert_eq!(policy.call_timeout, Some(Duration::from_secs(30)));
        assert_eq!(policy.test_timeout, Some(Duration::from_secs(90)));
        assert_eq!(policy.on_test_timeout, TestTimeoutPolicy::Requeue);
        assert_eq!(policy.on_stale_submission, StaleSubmissionPolicy::Requeue);
    }

    #[test]
    fn test_stale_requeue_replaces_sha() {
        let request = SubmitRequest::new("proj", "repo", 4, "feature", "old");
        let Step::Replace(replacement, reason) =
            stale_submission(&request, Sha::new("new"), StaleSubmissionPolicy::Requeue)
        else {
            panic!("expected replacement");
        };
        assert_eq!(replacement.sha1, Sha::new("new"));
        assert_eq!(replacement.pull_request_number, 4);
        assert_eq!(reason, STALE_REQUEUED);
    }

    #[test]
    fn test_outcome_message() {
        assert_eq!(Outcome::Merged.message(), MERGED_MESSAGE);
        let dropped = Outcome::Dropped {
            reason: "nope".to_string(),
        };
        assert_eq!(dropped.message(), "nope");
        assert!(!dropped.is_requeued());
    }
}
