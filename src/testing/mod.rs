//! Test runs and their one-shot results
//!
//! A test trigger hands back a [`RunningTest`], a future that resolves
//! exactly once with a [`TestResult`]. The resolving side is a
//! [`TestResultSender`], which is consumed on use, so a run cannot report
//! twice.

mod http;
mod pending;
mod template;

pub use http::HttpTestTrigger;
pub use pending::PendingTests;
pub use template::render_body;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

/// Outcome of a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether the tests passed
    pub passed: bool,
    /// Failure description, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// A passing result
    pub const fn passed() -> Self {
        Self {
            passed: true,
            error: None,
        }
    }

    /// A failing result with a reason
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error: Some(error.into()),
        }
    }

    /// The failure reason, or a placeholder when none was given
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("no error reported")
    }
}

/// Resolving half of a [`RunningTest`]
#[derive(Debug)]
pub struct TestResultSender {
    tx: oneshot::Sender<TestResult>,
}

impl TestResultSender {
    /// Deliver the result. Returns `false` if nobody is waiting anymore.
    pub fn resolve(self, result: TestResult) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Whether the waiting side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Error returned when a test result does not arrive in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no test result after {0:?}")]
pub struct TestDeadlineExceeded(pub Duration);

/// A test run whose result has not been consumed yet
#[derive(Debug)]
pub struct RunningTest {
    result: oneshot::Receiver<TestResult>,
}

impl RunningTest {
    /// Create a pending run and the sender that resolves it
    pub fn channel() -> (TestResultSender, Self) {
        let (tx, rx) = oneshot::channel();
        (TestResultSender { tx }, Self { result: rx })
    }

    /// A run that has already finished
    pub fn resolved(result: TestResult) -> Self {
        let (sender, running) = Self::channel();
        sender.resolve(result);
        running
    }

    /// Wait for the result with no deadline
    ///
    /// A sender dropped without resolving counts as a failed run.
    pub async fn wait(self) -> TestResult {
        self.result
            .await
            .unwrap_or_else(|_| TestResult::failed("test runner went away without a result"))
    }

    /// Wait for the result, giving up after `deadline`
    pub async fn wait_for(self, deadline: Duration) -> Result<TestResult, TestDeadlineExceeded> {
        tokio::time::timeout(deadline, self.wait())
            .await
            .map_err(|_| TestDeadlineExceeded(deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolved_run() {
        let running = RunningTest::resolved(TestResult::passed());
        assert_eq!(running.wait().await, TestResult::passed());
    }

    #[tokio::test]
    async fn test_channel_resolves_later() {
        let (sender, running) = RunningTest::channel();
        tokio::spawn(async move {
            sender.resolve(TestResult::failed("lint"));
        });
        let result = running.wait().await;
        assert!(!result.passed);
        assert_eq!(result.error_message(), "lint");
    }

    #[tokio::test]
    async fn test_dropped_sender_fails() {
        let (sender, running) = RunningTest::channel();
        drop(sender);
        let result = running.wait().await;
        assert!(!result.passed);
        assert!(result.error_message().contains("went away"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_deadline() {
        let (_sender, running) = RunningTest::channel();
        let err = running
            .wait_for(Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err, TestDeadlineExceeded(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_resolve_after_receiver_dropped() {
        let (sender, running) = RunningTest::channel();
        drop(running);
        assert!(!sender.resolve(TestResult::passed()));
    }

    #[test]
    fn test_result_deserializes_without_error() {
        let result: TestResult = serde_json::from_str(r#"{"passed": true}"#).unwrap();
        assert_eq!(result, TestResult::passed());
    }
}
