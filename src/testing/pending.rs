//! Test runs waiting for a result callback

use super::{RunningTest, TestResult, TestResultSender};
use crate::types::SubmitRequest;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Runs started by a trigger whose result arrives later, keyed by run id
///
/// Clones share the same table, so the trigger registers runs and the API
/// resolves them.
#[derive(Debug, Clone, Default)]
pub struct PendingTests {
    runs: Arc<Mutex<HashMap<String, TestResultSender>>>,
    next_id: Arc<AtomicU64>,
}

impl PendingTests {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TestResultSender>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a run id for `request` and the run that waits on it
    pub fn register(&self, request: &SubmitRequest) -> (String, RunningTest) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}-{}-{n}", request.pull_request_number, request.sha1.short());
        let (sender, running) = RunningTest::channel();

        let mut runs = self.lock();
        // Runs whose waiter gave up (deadline, shutdown) can never be resolved
        runs.retain(|_, sender| !sender.is_closed());
        runs.insert(id.clone(), sender);
        drop(runs);

        debug!(run_id = %id, "registered test run");
        (id, running)
    }

    /// Deliver the result for `id`
    ///
    /// Returns `false` if the id is unknown, already resolved, or nobody is
    /// waiting for it anymore.
    pub fn resolve(&self, id: &str, result: TestResult) -> bool {
        let Some(sender) = self.lock().remove(id) else {
            return false;
        };
        sender.resolve(result)
    }

    /// Forget `id` without resolving it
    pub fn cancel(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Number of runs still waiting
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no run is waiting
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmitRequest {
        SubmitRequest::new("web", "api", 7, "feature", "0123456789abcdef")
    }

    #[tokio::test]
    async fn test_register_then_resolve() {
        let pending = PendingTests::new();
        let (id, running) = pending.register(&request());
        assert_eq!(id, "7-0123456-1");
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(&id, TestResult::failed("flaky")));
        assert_eq!(running.wait().await, TestResult::failed("flaky"));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_resolve_twice_or_unknown() {
        let pending = PendingTests::new();
        let (id, _running) = pending.register(&request());

        assert!(pending.resolve(&id, TestResult::passed()));
        assert!(!pending.resolve(&id, TestResult::passed()));
        assert!(!pending.resolve("nope", TestResult::passed()));
    }

    #[test]
    fn test_ids_are_unique() {
        let pending = PendingTests::new();
        let (a, _ra) = pending.register(&request());
        let (b, _rb) = pending.register(&request());
        assert_ne!(a, b);
    }

    #[test]
    fn test_abandoned_runs_are_pruned() {
        let pending = PendingTests::new();
        let (_, running) = pending.register(&request());
        drop(running);

        let (_, _kept) = pending.register(&request());
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_fails_the_run() {
        let pending = PendingTests::new();
        let (id, running) = pending.register(&request());
        pending.cancel(&id);

        assert!(!running.wait().await.passed);
    }
}
