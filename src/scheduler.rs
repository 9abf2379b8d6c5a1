use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

use crate::{config::LoaderConfig, pending_batch::PendingBatch};

/// When an open batch stops accepting waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Close once the worker has drained every queued request and yielded `yield_rounds` times
    /// without new ones arriving, i.e. at the end of the execution frame.
    YieldBoundary { yield_rounds: usize },
    /// Close this long after the batch's first request.
    Window(Duration),
}

/// Why a batch was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    MaxBatchSize,
    Window,
    YieldBoundary,
    Flush,
    Shutdown,
}

/// Decides the close condition of the open batch. The worker consults it after every op.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    policy: FlushPolicy,
    max_batch_size: Option<usize>,
}

impl Scheduler {
    pub fn new(config: &LoaderConfig) -> Self {
        Self { policy: config.flush_policy(), max_batch_size: config.max_batch_size }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Yield rounds to run at the end of a frame before closing, or `None` when batches close on
    /// a timer instead.
    pub fn frame_end_yields(&self) -> Option<usize> {
        match self.policy {
            FlushPolicy::YieldBoundary { yield_rounds } => Some(yield_rounds),
            FlushPolicy::Window(_) => None,
        }
    }

    /// Instant at which `batch` must close regardless of new arrivals.
    pub fn deadline<K, V, E>(&self, batch: &PendingBatch<K, V, E>) -> Option<Instant>
    where
        K: Eq + Hash + Clone,
    {
        match self.policy {
            FlushPolicy::Window(window) => Some(batch.opened_at() + window),
            FlushPolicy::YieldBoundary { .. } => None,
        }
    }

    /// Whether a non-empty `batch` has to close before `keys` are attached because they would
    /// push it past the size limit. Requests are never split, so the next batch takes them whole.
    pub fn overflows<K, V, E>(&self, batch: &PendingBatch<K, V, E>, keys: &HashSet<K>) -> bool
    where
        K: Eq + Hash + Clone,
    {
        match self.max_batch_size {
            Some(max) => {
                batch.key_count() > 0 && batch.key_count() + batch.new_key_count(keys) > max
            }
            None => false,
        }
    }

    pub fn is_full<K, V, E>(&self, batch: &PendingBatch<K, V, E>) -> bool
    where
        K: Eq + Hash + Clone,
    {
        matches!(self.max_batch_size, Some(max) if batch.key_count() >= max)
    }
}
