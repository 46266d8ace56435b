//! Progress reporting and cooperative cancellation shared by the loader and saver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One progress notification: `done` out of `total` units plus a status line.
///
/// Units are bytes for loads and characters for saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub done: u64,
    pub total: u64,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(done: u64, total: u64, message: impl Into<String>) -> Self {
        ProgressUpdate {
            done,
            total,
            message: message.into(),
        }
    }

    /// Completed fraction in `[0, 1]`. An empty job counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.done as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

/// Receiver of progress notifications emitted by a running worker.
pub trait ProgressSink {
    fn report(&mut self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressUpdate),
{
    fn report(&mut self, update: ProgressUpdate) {
        self(update)
    }
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _update: ProgressUpdate) {}
}

/// Shared cancellation flag, set by the owner and polled by the worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Number of units between two progress updates when a job is split into
/// `steps` roughly equal parts. Never zero.
pub fn progress_step(total: u64, steps: u64) -> u64 {
    (total / steps.max(1)).max(1)
}
