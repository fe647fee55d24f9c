//! UI-thread affinity and work dispatch.
//!
//! A [`Dispatcher`] is created on the thread that owns UI state and stays
//! there: it holds the receiving end of a FIFO callback queue and drains it
//! whenever the UI thread is idle. Any thread can hold a [`DispatcherHandle`]
//! to enqueue callbacks, spawn workers, or check which thread it is on.
//!
//! # Invariants
//!
//! 1. Queued callbacks run one at a time, on the UI thread only.
//! 2. Callbacks submitted from one thread run in submission order.
//! 3. A panic or `Err` inside a callback is reported to the error sink and
//!    the loop moves on to the next callback.
//! 4. `run_on_ui_thread` never blocks the caller.

pub mod callback;
pub mod sink;
pub mod worker;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, PropertyError};
use crate::shutdown::ShutdownHandle;

pub use callback::{CallbackHandle, CallbackState};
pub use sink::{ErrorSink, FailureKind, FailureReport, FailureSource, TracingErrorSink};
pub use worker::{CancellationFlag, Cancelled, TaskFailure, TaskResult, WorkerHandle};

use sink::{panic_message, SinkSlot};

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

struct QueuedCallback {
    handle: CallbackHandle,
    job: Job,
}

struct Shared {
    ui_thread: ThreadId,
    sender: Sender<QueuedCallback>,
    sink: SinkSlot,
    next_callback_id: AtomicU64,
    next_worker_id: AtomicU64,
    worker_name_prefix: String,
}

/// Thread-safe handle to a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("ui_thread", &self.shared.ui_thread)
            .finish_non_exhaustive()
    }
}

impl DispatcherHandle {
    pub fn ui_thread_id(&self) -> ThreadId {
        self.shared.ui_thread
    }

    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.shared.ui_thread
    }

    /// Fails with `WrongThreadAccess` unless called on the UI thread.
    pub fn assert_ui_thread(&self) -> Result<(), PropertyError> {
        self.check_thread("assert_ui_thread")
    }

    pub(crate) fn check_thread(&self, operation: &'static str) -> Result<(), PropertyError> {
        let actual = thread::current().id();
        if actual == self.shared.ui_thread {
            Ok(())
        } else {
            Err(PropertyError::WrongThreadAccess {
                operation,
                expected: self.shared.ui_thread,
                actual,
            })
        }
    }

    /// Queue `callback` to run on the UI thread's next idle cycle.
    pub fn run_on_ui_thread<F>(&self, callback: F) -> Result<CallbackHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(move || {
            callback();
            Ok(())
        }))
    }

    /// Like [`run_on_ui_thread`](Self::run_on_ui_thread), but an `Err`
    /// returned by the callback is reported to the error sink.
    pub fn try_run_on_ui_thread<F>(&self, callback: F) -> Result<CallbackHandle, DispatchError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(Box::new(callback))
    }

    fn enqueue(&self, job: Job) -> Result<CallbackHandle, DispatchError> {
        let id = self.shared.next_callback_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = CallbackHandle::new(id);
        self.shared
            .sender
            .send(QueuedCallback {
                handle: handle.clone(),
                job,
            })
            .map_err(|_| DispatchError::Closed)?;
        tracing::trace!(callback_id = id, "Callback enqueued");
        Ok(handle)
    }

    /// Run `task` on a new worker thread.
    pub fn spawn_worker<F, R>(&self, task: F) -> Result<WorkerHandle<R>, DispatchError>
    where
        F: FnOnce(CancellationFlag) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let id = self.next_worker_id();
        let name = format!("{}-{}", self.shared.worker_name_prefix, id);
        worker::spawn(id, name, self.shared.sink.clone(), task)
    }

    /// Run `task` on a new worker thread named `name`.
    pub fn spawn_named_worker<F, R>(
        &self,
        name: impl Into<String>,
        task: F,
    ) -> Result<WorkerHandle<R>, DispatchError>
    where
        F: FnOnce(CancellationFlag) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let id = self.next_worker_id();
        worker::spawn(id, name.into(), self.shared.sink.clone(), task)
    }

    /// Replace the process-wide error sink.
    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        self.shared.sink.replace(sink);
    }

    fn next_worker_id(&self) -> u64 {
        self.shared.next_worker_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// The UI thread's end of the dispatch queue.
///
/// Not `Sync`: it belongs to the thread that created it, and every draining
/// call checks that it is still running there.
pub struct Dispatcher {
    handle: DispatcherHandle,
    receiver: Receiver<QueuedCallback>,
    poll_interval: Duration,
    max_callbacks_per_cycle: usize,
}

impl Dispatcher {
    /// Create a dispatcher whose UI thread is the calling thread.
    pub fn new() -> Self {
        Self::with_config(&DispatcherConfig::default())
    }

    pub fn with_config(config: &DispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let ui_thread = thread::current().id();
        tracing::debug!(?ui_thread, "Dispatcher created");

        Self {
            handle: DispatcherHandle {
                shared: Arc::new(Shared {
                    ui_thread,
                    sender,
                    sink: SinkSlot::new(),
                    next_callback_id: AtomicU64::new(0),
                    next_worker_id: AtomicU64::new(0),
                    worker_name_prefix: config.worker_name_prefix.clone(),
                }),
            },
            receiver,
            poll_interval: config.poll_interval(),
            max_callbacks_per_cycle: config.max_callbacks_per_cycle.max(1),
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    pub fn is_ui_thread(&self) -> bool {
        self.handle.is_ui_thread()
    }

    pub fn assert_ui_thread(&self) -> Result<(), PropertyError> {
        self.handle.assert_ui_thread()
    }

    pub fn run_on_ui_thread<F>(&self, callback: F) -> Result<CallbackHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.run_on_ui_thread(callback)
    }

    pub fn spawn_worker<F, R>(&self, task: F) -> Result<WorkerHandle<R>, DispatchError>
    where
        F: FnOnce(CancellationFlag) -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_worker(task)
    }

    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        self.handle.set_error_sink(sink);
    }

    /// Run every queued callback, including ones enqueued while draining.
    ///
    /// Returns how many callbacks actually ran (cancelled ones are skipped).
    pub fn drain(&self) -> Result<usize, PropertyError> {
        self.handle.check_thread("drain")?;
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(queued) => {
                    if self.execute(queued) {
                        ran += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(ran)
    }

    /// One idle cycle: wait up to `timeout` for work, then run at most
    /// `max_callbacks_per_cycle` callbacks. Returns how many ran.
    pub fn poll(&self, timeout: Duration) -> Result<usize, PropertyError> {
        self.handle.check_thread("poll")?;
        let first = match self.receiver.recv_timeout(timeout) {
            Ok(queued) => queued,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return Ok(0),
        };

        // Cancelled callbacks are skipped without using up the budget.
        let mut ran = usize::from(self.execute(first));
        while ran < self.max_callbacks_per_cycle {
            match self.receiver.try_recv() {
                Ok(queued) => {
                    if self.execute(queued) {
                        ran += 1;
                    }
                }
                Err(_) => break,
            }
        }
        Ok(ran)
    }

    /// Drive the queue until `shutdown` is signalled, then drain what is left.
    pub fn run(&self, shutdown: &ShutdownHandle) -> Result<(), PropertyError> {
        self.handle.check_thread("run")?;
        tracing::debug!("Dispatch loop started");
        while !shutdown.is_shutting_down() {
            self.poll(self.poll_interval)?;
        }
        let leftover = self.drain()?;
        tracing::debug!(leftover, "Dispatch loop stopped");
        Ok(())
    }

    fn execute(&self, queued: QueuedCallback) -> bool {
        let QueuedCallback { handle, job } = queued;
        if !handle.begin() {
            tracing::trace!(callback_id = handle.id(), "Skipping cancelled callback");
            return false;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(job));
        handle.complete();

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some((FailureKind::Error, format!("{err:#}"))),
            Err(payload) => Some((FailureKind::Panic, panic_message(&*payload))),
        };
        if let Some((kind, details)) = failure {
            self.handle.shared.sink.report(FailureReport {
                source: FailureSource::Callback { id: handle.id() },
                kind,
                details,
            });
        }
        true
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("ui_thread", &self.handle.shared.ui_thread)
            .field("poll_interval", &self.poll_interval)
            .field("max_callbacks_per_cycle", &self.max_callbacks_per_cycle)
            .finish()
    }
}
