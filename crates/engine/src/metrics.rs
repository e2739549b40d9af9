//! Stream lifecycle metrics
//!
//! Every stream an engine starts is counted once on start and once on its
//! terminal outcome:
//! - Completed: the channel was closed normally
//! - Failed: the channel was errored
//! - Cancelled: the consumer cancelled before the driver finished

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::request::Intent;

/// How a driver run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// All batches delivered and the channel closed
    Completed,
    /// The consumer cancelled
    Cancelled,
    /// The channel was failed with an error
    Failed,
}

/// Counters shared by every engine of a registry
///
/// # Memory Ordering
///
/// All counters use Relaxed ordering. They are observational only and do
/// not synchronize any other memory.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    active: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl StreamMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stream start
    pub fn record_start(&self, entity: &str, intent: Intent) {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(target: "rowstream::stream", entity, %intent, "Stream started");
    }

    /// Record a stream's terminal outcome
    pub fn record_completion(&self, entity: &str, intent: Intent, completion: Completion) {
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
        let counter = match completion {
            Completion::Completed => &self.completed,
            Completion::Cancelled => &self.cancelled,
            Completion::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        info!(target: "rowstream::stream", entity, %intent, ?completion, "Stream finished");
    }

    /// Current snapshot of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active: self.active.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StreamMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Streams whose driver is still running
    pub active: u64,
    /// Streams started
    pub started: u64,
    /// Streams closed normally
    pub completed: u64,
    /// Streams failed
    pub failed: u64,
    /// Streams cancelled by the consumer
    pub cancelled: u64,
}

impl MetricsSnapshot {
    /// Streams that reached a terminal outcome
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}
