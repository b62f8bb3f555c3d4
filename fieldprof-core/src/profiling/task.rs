//! Cooperative task handle and background execution.
//!
//! The engine sees only [`TaskHandle`]: it polls for cancellation once per
//! row and reports progress as a percentage. [`ProfilingTask`] runs one pass
//! on a tokio blocking worker, with cancellation through a shared flag and
//! progress through a `watch` channel that keeps only the latest value.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Result;
use crate::error::ProfileError;
use crate::source::RecordSource;

use super::engine::{ProfilingEngine, RunOutcome, RunRequest};

/// Host-side view of a running pass.
pub trait TaskHandle: Send + Sync {
    /// Whether the host asked the pass to stop.
    fn is_cancelled(&self) -> bool;

    /// Publishes progress in percent. Fire-and-forget.
    fn report_progress(&self, percent: u8);
}

/// Handle that never cancels and drops progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTask;

impl TaskHandle for NoopTask {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn report_progress(&self, _percent: u8) {}
}

#[derive(Debug)]
struct WorkerHandle {
    cancelled: Arc<AtomicBool>,
    progress: watch::Sender<u8>,
}

impl TaskHandle for WorkerHandle {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn report_progress(&self, percent: u8) {
        self.progress.send_replace(percent);
    }
}

/// A profiling pass running on a background worker.
#[derive(Debug)]
pub struct ProfilingTask {
    cancelled: Arc<AtomicBool>,
    progress: watch::Receiver<u8>,
    handle: JoinHandle<RunOutcome>,
}

impl ProfilingTask {
    /// Starts `engine` over `source` on a blocking worker of the current
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns an error when called outside a tokio runtime.
    pub fn spawn<S>(mut engine: ProfilingEngine, mut source: S, request: RunRequest) -> Result<Self>
    where
        S: RecordSource + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProfileError::worker(format!("no tokio runtime available: {}", e)))?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let (progress_tx, progress_rx) = watch::channel(0u8);
        let worker = WorkerHandle {
            cancelled: Arc::clone(&cancelled),
            progress: progress_tx,
        };

        let handle =
            runtime.spawn_blocking(move || engine.run(&mut source, &request, &worker));

        Ok(Self {
            cancelled,
            progress: progress_rx,
            handle,
        })
    }

    /// Requests cancellation; the worker stops at its next row.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Receiver of progress updates.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    /// Whether the worker has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns the outcome of the pass.
    ///
    /// # Errors
    /// Returns an error if the worker panicked or was aborted.
    pub async fn wait(self) -> Result<RunOutcome> {
        self.handle
            .await
            .map_err(|e| ProfileError::worker(e.to_string()))
    }
}
