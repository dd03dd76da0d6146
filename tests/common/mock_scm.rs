//! In-memory SCM doubles for testing
//!
//! Heads are scripted: each fetch consumes the next scripted value, and the
//! last one repeats forever. This is how tests make a branch or PR move
//! between the baseline fetch and the revalidation fetch.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use submit_queue::error::{Error, Result};
use submit_queue::scm::{MergeCandidacy, PullRequest, Repo};
use submit_queue::types::Sha;

/// Scripted sequence of head values
#[derive(Debug, Default)]
struct HeadScript {
    heads: VecDeque<Sha>,
    calls: usize,
    error: Option<String>,
    // Calls that succeed before `error` applies
    healthy_calls: usize,
    delay: Option<Duration>,
}

impl HeadScript {
    fn new(heads: &[&str]) -> Self {
        Self {
            heads: heads.iter().map(|h| Sha::new(*h)).collect(),
            ..Self::default()
        }
    }

    fn fail_after(&mut self, calls: usize, msg: &str) {
        self.error = Some(msg.to_string());
        self.healthy_calls = calls;
    }

    fn next(&mut self) -> Result<Sha> {
        self.calls += 1;
        if let Some(msg) = &self.error
            && self.calls > self.healthy_calls
        {
            return Err(Error::Platform(msg.clone()));
        }
        let head = if self.heads.len() > 1 {
            self.heads.pop_front()
        } else {
            self.heads.front().cloned()
        };
        head.ok_or_else(|| Error::Platform("no head scripted".to_string()))
    }
}

/// Mock repository
///
/// Clones share state, so a test can keep a handle while the project hands
/// boxed copies to the reconciler.
#[derive(Clone)]
pub struct MockRepo {
    is_github: bool,
    script: Arc<Mutex<HeadScript>>,
}

impl MockRepo {
    /// A GitHub-flavored repo whose head follows `heads`
    pub fn github(heads: &[&str]) -> Self {
        Self {
            is_github: true,
            script: Arc::new(Mutex::new(HeadScript::new(heads))),
        }
    }

    /// A repo without strict identity tracking
    pub fn gitlab(heads: &[&str]) -> Self {
        Self {
            is_github: false,
            ..Self::github(heads)
        }
    }

    /// Make `head_sha1` return an error
    pub fn fail_head(&self, msg: &str) {
        self.script.lock().unwrap().fail_after(0, msg);
    }

    /// Let the first `calls` fetches succeed, then make `head_sha1` fail
    pub fn fail_head_after(&self, calls: usize, msg: &str) {
        self.script.lock().unwrap().fail_after(calls, msg);
    }

    /// Make `head_sha1` take `delay` before answering
    pub fn delay_head(&self, delay: Duration) {
        self.script.lock().unwrap().delay = Some(delay);
    }

    /// Number of `head_sha1` calls so far
    pub fn head_calls(&self) -> usize {
        self.script.lock().unwrap().calls
    }
}

#[async_trait]
impl Repo for MockRepo {
    fn is_github(&self) -> bool {
        self.is_github
    }

    async fn head_sha1(&self) -> Result<Sha> {
        let delay = self.script.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().unwrap().next()
    }
}

#[derive(Debug)]
struct PrState {
    candidacy: std::result::Result<MergeCandidacy, String>,
    merge_error: Option<String>,
    merged_heads: Vec<Sha>,
    candidacy_calls: usize,
}

/// Mock pull request
#[derive(Clone)]
pub struct MockPullRequest {
    script: Arc<Mutex<HeadScript>>,
    state: Arc<Mutex<PrState>>,
}

impl MockPullRequest {
    /// A mergeable PR whose head follows `heads`
    pub fn new(heads: &[&str]) -> Self {
        Self {
            script: Arc::new(Mutex::new(HeadScript::new(heads))),
            state: Arc::new(Mutex::new(PrState {
                candidacy: Ok(MergeCandidacy::mergeable()),
                merge_error: None,
                merged_heads: Vec::new(),
                candidacy_calls: 0,
            })),
        }
    }

    // === Error injection methods ===

    /// Make `head_sha1` return an error
    pub fn fail_head(&self, msg: &str) {
        self.script.lock().unwrap().fail_after(0, msg);
    }

    /// Let the first `calls` fetches succeed, then make `head_sha1` fail
    pub fn fail_head_after(&self, calls: usize, msg: &str) {
        self.script.lock().unwrap().fail_after(calls, msg);
    }

    /// Report the PR as not mergeable
    pub fn block(&self, reason: &str) {
        self.state.lock().unwrap().candidacy = Ok(MergeCandidacy::blocked(reason));
    }

    /// Make `is_merge_candidate` return an error
    pub fn fail_candidacy(&self, msg: &str) {
        self.state.lock().unwrap().candidacy = Err(msg.to_string());
    }

    /// Make `merge` return an error
    pub fn fail_merge(&self, msg: &str) {
        self.state.lock().unwrap().merge_error = Some(msg.to_string());
    }

    // === Call tracking ===

    /// Number of `merge` calls so far
    pub fn merge_calls(&self) -> usize {
        self.state.lock().unwrap().merged_heads.len()
    }

    /// Heads passed to `merge`, in call order
    pub fn merged_heads(&self) -> Vec<Sha> {
        self.state.lock().unwrap().merged_heads.clone()
    }

    /// Number of `is_merge_candidate` calls so far
    pub fn candidacy_calls(&self) -> usize {
        self.state.lock().unwrap().candidacy_calls
    }

    /// Number of `head_sha1` calls so far
    pub fn head_calls(&self) -> usize {
        self.script.lock().unwrap().calls
    }

    /// Assert that `merge` was called exactly once
    pub fn assert_merged(&self) {
        assert_eq!(self.merge_calls(), 1, "expected exactly one merge call");
    }

    /// Assert that `merge` was never called
    pub fn assert_not_merged(&self) {
        assert_eq!(self.merge_calls(), 0, "expected no merge call");
    }
}

#[async_trait]
impl PullRequest for MockPullRequest {
    async fn head_sha1(&self) -> Result<Sha> {
        self.script.lock().unwrap().next()
    }

    async fn is_merge_candidate(&self) -> Result<MergeCandidacy> {
        let mut state = self.state.lock().unwrap();
        state.candidacy_calls += 1;
        state.candidacy.clone().map_err(Error::Platform)
    }

    async fn merge(&self, head: &Sha) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.merged_heads.push(head.clone());
        match &state.merge_error {
            Some(msg) => Err(Error::MergeRejected(msg.clone())),
            None => Ok(()),
        }
    }
}
