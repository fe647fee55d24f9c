//! Background workers for blocking or long-running work.
//!
//! A worker runs on its own OS thread; the dispatcher does not own it and
//! only hands back a [`WorkerHandle`]. Cancellation is cooperative: the task
//! receives a [`CancellationFlag`] and is expected to poll it at safe points.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::dispatch::sink::{panic_message, FailureKind, FailureReport, FailureSource, SinkSlot};
use crate::error::DispatchError;

/// Returned by [`CancellationFlag::check`] once cancellation was requested.
///
/// A task that propagates it with `?` finishes as [`TaskFailure::Cancelled`].
#[derive(Debug, Clone, Copy, Error)]
#[error("task cancelled")]
pub struct Cancelled;

/// Shared cancellation request between a worker and its handle.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Why a worker task produced no value.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled")]
    Cancelled,

    /// The worker thread went away without delivering a result.
    #[error("task result was lost")]
    Lost,
}

impl TaskFailure {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskFailure::Cancelled)
    }
}

pub type TaskResult<R> = Result<R, TaskFailure>;

/// Completion handle of a spawned worker.
///
/// Dropping the handle detaches the worker; a failure it produces afterwards
/// goes to the dispatcher's error sink instead.
pub struct WorkerHandle<R> {
    id: u64,
    name: String,
    cancel: CancellationFlag,
    finished: Arc<AtomicBool>,
    receiver: oneshot::Receiver<TaskResult<R>>,
}

impl<R> std::fmt::Debug for WorkerHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<R> WorkerHandle<R> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation. Best-effort: a task that never polls its flag
    /// runs to completion.
    pub fn cancel(&self) {
        tracing::debug!(task_id = self.id, task = %self.name, "Worker cancellation requested");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// True once the task has returned (or unwound).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Block the calling thread until the task finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime; use [`wait`](Self::wait)
    /// there instead.
    pub fn join(self) -> TaskResult<R> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskFailure::Lost))
    }

    /// Await the task's completion without blocking a runtime thread.
    pub async fn wait(self) -> TaskResult<R> {
        self.receiver.await.unwrap_or(Err(TaskFailure::Lost))
    }
}

pub(crate) fn spawn<F, R>(
    id: u64,
    name: String,
    sink: SinkSlot,
    task: F,
) -> Result<WorkerHandle<R>, DispatchError>
where
    F: FnOnce(CancellationFlag) -> anyhow::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let cancel = CancellationFlag::new();
    let finished = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = oneshot::channel();

    let task_cancel = cancel.clone();
    let task_finished = Arc::clone(&finished);
    let task_name = name.clone();

    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            tracing::trace!(task_id = id, task = %task_name, "Worker started");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(task_cancel)));
            let result = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) if err.is::<Cancelled>() => Err(TaskFailure::Cancelled),
                Ok(Err(err)) => Err(TaskFailure::Failed(err)),
                Err(payload) => Err(TaskFailure::Panicked(panic_message(&*payload))),
            };
            task_finished.store(true, Ordering::SeqCst);

            match &result {
                Ok(_) => tracing::trace!(task_id = id, task = %task_name, "Worker finished"),
                Err(failure) => {
                    tracing::debug!(task_id = id, task = %task_name, "Worker ended: {}", failure)
                }
            }

            if let Err(Err(failure)) = sender.send(result) {
                if failure.is_cancelled() {
                    return;
                }
                let kind = match failure {
                    TaskFailure::Panicked(_) => FailureKind::Panic,
                    _ => FailureKind::Error,
                };
                sink.report(FailureReport {
                    source: FailureSource::Task {
                        id,
                        name: task_name,
                    },
                    kind,
                    details: failure.to_string(),
                });
            }
        })?;

    tracing::debug!(task_id = id, task = %name, "Worker spawned");

    Ok(WorkerHandle {
        id,
        name,
        cancel,
        finished,
        receiver,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reports_cancellation() {
        let flag = CancellationFlag::new();
        assert!(flag.check().is_ok());
        let shared = flag.clone();
        shared.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.check().is_err());
    }

    #[test]
    fn cancelled_error_is_recognised_through_anyhow() {
        let err: anyhow::Error = Cancelled.into();
        assert!(err.is::<Cancelled>());
    }
}
