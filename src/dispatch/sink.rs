//! Process-wide reporting of failures that have no caller to return to.
//!
//! Panics and errors inside UI callbacks end up here, as do failed worker
//! tasks whose handle was dropped before anyone joined it.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

/// Where a failure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSource {
    Callback { id: u64 },
    Task { id: u64, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The code unwound with a panic.
    Panic,
    /// The code returned an `Err`.
    Error,
}

#[derive(Debug, Clone)]
pub struct FailureReport {
    pub source: FailureSource,
    pub kind: FailureKind,
    pub details: String,
}

pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &FailureReport);
}

/// Default sink: logs every report at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, report: &FailureReport) {
        match &report.source {
            FailureSource::Callback { id } => tracing::error!(
                callback_id = id,
                kind = ?report.kind,
                "UI callback failed: {}",
                report.details
            ),
            FailureSource::Task { id, name } => tracing::error!(
                task_id = id,
                task = %name,
                kind = ?report.kind,
                "Unobserved worker failure: {}",
                report.details
            ),
        }
    }
}

/// Swappable sink shared by a dispatcher, its handles and its workers.
#[derive(Clone)]
pub(crate) struct SinkSlot {
    inner: Arc<RwLock<Arc<dyn ErrorSink>>>,
}

impl SinkSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(TracingErrorSink))),
        }
    }

    pub(crate) fn replace(&self, sink: Arc<dyn ErrorSink>) {
        *self.inner.write() = sink;
    }

    pub(crate) fn report(&self, report: FailureReport) {
        // Clone out so a sink may swap itself without deadlocking.
        let sink = Arc::clone(&*self.inner.read());
        sink.report(&report);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
