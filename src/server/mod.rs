//! Submission API
//!
//! # Endpoints
//!
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /api/v1/projects` - Names of registered projects
//! - `GET /api/v1/projects/{project}/queue` - Queued requests in processing order
//! - `POST /api/v1/projects/{project}/requests` - Submit a PR (returns 202 Accepted)
//! - `POST /api/v1/projects/{project}/results/{run_id}` - Result of a callback test run

use crate::error::Result;
use crate::project::ProjectRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod handlers;

pub use handlers::{
    ApiError, PriorityInput, SubmitBody, health_handler, list_projects_handler, queue_handler,
    submit_handler, test_result_handler,
};

/// Shared application state, passed to handlers via axum's `State` extractor
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: ProjectRegistry,
}

impl AppState {
    /// Wrap the registry whose queues the API exposes
    pub fn new(registry: ProjectRegistry) -> Self {
        Self {
            inner: Arc::new(AppStateInner { registry }),
        }
    }

    /// Registered projects
    pub fn registry(&self) -> &ProjectRegistry {
        &self.inner.registry
    }
}

/// Builds the axum Router with all endpoints
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/projects", get(list_projects_handler))
        .route("/api/v1/projects/{project}/queue", get(queue_handler))
        .route("/api/v1/projects/{project}/requests", post(submit_handler))
        .route(
            "/api/v1/projects/{project}/results/{run_id}",
            post(test_result_handler),
        )
        .with_state(app_state)
}

/// Bind the API listener
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "submission API listening");
    Ok(listener)
}

/// Serve the API on `listener` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    app_state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_is_clone() {
        let state = AppState::new(ProjectRegistry::new());
        let cloned = state.clone();
        assert!(cloned.registry().is_empty());
        assert!(Arc::ptr_eq(&state.inner, &cloned.inner));
    }
}
