//! Per-project worker loop

use crate::config::QueueSettings;
use crate::project::{Project, ProjectRegistry};
use crate::queue::QueueError;
use crate::reconcile::{ReconcilePolicy, process_request};
use crate::report::Reporter;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drain `project`'s queue until `shutdown` is cancelled
///
/// Requests are processed strictly one at a time. Cancellation is checked
/// between requests and during the idle sleep; a request already being
/// reconciled always runs to completion.
pub async fn run_worker(
    project: Arc<dyn Project>,
    reporter: Arc<dyn Reporter>,
    settings: QueueSettings,
    shutdown: CancellationToken,
) {
    let policy = ReconcilePolicy::from(&settings);
    info!(project = project.name(), "worker started");

    while !shutdown.is_cancelled() {
        let request = match project.queue().next() {
            Ok(request) => request,
            Err(QueueError::Empty) => {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(settings.poll_interval()) => continue,
                }
            }
            Err(QueueError::Unsorted) => {
                panic!("queue for project '{}' unsorted after sort", project.name())
            }
        };

        debug!(project = project.name(), %request, "dequeued");
        process_request(request, project.as_ref(), reporter.as_ref(), &policy).await;

        let pause = settings.pause_between_requests();
        if !pause.is_zero() {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    info!(project = project.name(), remaining = project.queue().len(), "worker stopped");
}

/// Spawn one worker per registered project
pub fn spawn_workers(
    registry: &ProjectRegistry,
    reporter: &Arc<dyn Reporter>,
    settings: &QueueSettings,
    shutdown: &CancellationToken,
) -> JoinSet<()> {
    let mut workers = JoinSet::new();
    for project in registry.iter() {
        workers.spawn(run_worker(
            Arc::clone(project),
            Arc::clone(reporter),
            settings.clone(),
            shutdown.clone(),
        ));
    }
    workers
}
