//! Priority submit queue
//!
//! The queue separates "mark dirty on mutation" from "sort on demand":
//! every enqueue marks the queue unsorted, and items can only leave a
//! sorted queue. The worker loop sorts once per iteration, so any number
//! of enqueues (including requeues from the reconciler) cost one sort.
//!
//! Canonical order:
//! 1. Emergency requests before everything else
//! 2. Within each partition, priority descending
//! 3. Ties keep enqueue order (stable sort)

use crate::types::SubmitRequest;
use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Why an item could not leave the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No items remain
    #[error("queue empty")]
    Empty,
    /// `sort()` has not been called since the last enqueue
    #[error("queue unsorted")]
    Unsorted,
}

/// Ordered collection of submit requests with an explicit sorted flag
#[derive(Debug, Clone, Default)]
pub struct SubmitQueue {
    sorted: bool,
    items: Vec<SubmitRequest>,
}

impl SubmitQueue {
    /// Create an empty, unsorted queue
    pub const fn new() -> Self {
        Self {
            sorted: false,
            items: Vec::new(),
        }
    }

    /// Create a queue holding `items`; it must be sorted before use
    pub const fn with_items(items: Vec<SubmitRequest>) -> Self {
        Self {
            sorted: false,
            items,
        }
    }

    /// Whether the items currently reflect canonical order
    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Number of queued items
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item. The queue must be sorted again afterwards.
    pub fn enqueue(&mut self, item: SubmitRequest) {
        self.items.push(item);
        self.sorted = false;
    }

    /// Apply canonical order and mark the queue sorted
    pub fn sort(&mut self) {
        // `sort_by_key` is stable, which keeps enqueue order among ties
        self.items
            .sort_by_key(|item| (Reverse(item.is_emergency), Reverse(item.priority)));
        self.sorted = true;
    }

    /// Remove and return the head of a sorted queue
    ///
    /// Removing the head never invalidates the order of the remainder, so
    /// the queue stays sorted.
    pub fn dequeue(&mut self) -> Result<SubmitRequest, QueueError> {
        if self.items.is_empty() {
            return Err(QueueError::Empty);
        }
        if !self.sorted {
            return Err(QueueError::Unsorted);
        }
        Ok(self.items.remove(0))
    }

    /// Look at the head of a sorted queue without removing it
    pub fn peek(&self) -> Result<&SubmitRequest, QueueError> {
        let Some(head) = self.items.first() else {
            return Err(QueueError::Empty);
        };
        if !self.sorted {
            return Err(QueueError::Unsorted);
        }
        Ok(head)
    }

    /// Items in their current order
    pub fn iter(&self) -> impl Iterator<Item = &SubmitRequest> {
        self.items.iter()
    }

    /// One line per item: `[ i] repo:number sha`
    pub fn dump(&self) -> Vec<String> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "[{i:2}] {}:{} {}",
                    item.repo_name, item.pull_request_number, item.sha1
                )
            })
            .collect()
    }
}

/// Shared handle to a project's queue
///
/// The worker and the submission API both mutate the queue, so access
/// goes through a mutex. The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct QueueHandle {
    inner: Arc<Mutex<SubmitQueue>>,
}

impl QueueHandle {
    /// Create a handle around an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the queue for a compound operation
    pub fn lock(&self) -> MutexGuard<'_, SubmitQueue> {
        // A panic while holding the lock cannot leave the items half-moved;
        // at worst the sorted flag is stale and the next sort fixes it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request
    pub fn enqueue(&self, item: SubmitRequest) {
        self.lock().enqueue(item);
    }

    /// Sort if needed and dequeue, under a single lock acquisition
    pub fn next(&self) -> Result<SubmitRequest, QueueError> {
        let mut queue = self.lock();
        if !queue.is_sorted() {
            queue.sort();
        }
        queue.dequeue()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue holds no items
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the live queue is currently sorted
    pub fn is_sorted(&self) -> bool {
        self.lock().is_sorted()
    }

    /// Items in canonical order, without touching the live queue
    pub fn snapshot(&self) -> Vec<SubmitRequest> {
        let mut copy = self.lock().clone();
        copy.sort();
        copy.items
    }
}
