//! submit-queue: a priority merge queue for GitHub and GitLab
//!
//! Pull requests are submitted to a per-project queue, ordered emergency
//! first and then by priority, and processed one at a time. Each request
//! is tested and merged only if neither the target branch nor the PR moved
//! while its tests ran; otherwise it goes back on the queue.
//!
//! The main entry points are:
//! - [`queue::SubmitQueue`] for ordering
//! - [`reconcile::process_request`] for the test-and-verify protocol
//! - [`worker::run_worker`] for the per-project loop
//! - [`server::build_router`] for the submission API

pub mod auth;
pub mod config;
pub mod error;
pub mod project;
pub mod queue;
pub mod reconcile;
pub mod report;
pub mod scm;
pub mod server;
pub mod testing;
pub mod types;
pub mod worker;

pub use error::{Error, Result};
