use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a callback scheduled with `run_on_ui_thread`.
///
/// `Enqueued -> Running -> Completed`, or `Enqueued -> Cancelled` when the
/// callback is cancelled before the UI thread picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallbackState {
    Enqueued = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
}

impl CallbackState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CallbackState::Enqueued,
            1 => CallbackState::Running,
            2 => CallbackState::Completed,
            _ => CallbackState::Cancelled,
        }
    }

    /// True once the callback can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, CallbackState::Completed | CallbackState::Cancelled)
    }
}

/// Handle to a callback sitting in (or already drained from) the UI queue.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    id: u64,
    state: Arc<AtomicU8>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: Arc::new(AtomicU8::new(CallbackState::Enqueued as u8)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> CallbackState {
        CallbackState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Cancel the callback if it has not started yet.
    ///
    /// Returns `false` once the callback is running or finished; a running
    /// callback always runs to completion.
    pub fn cancel(&self) -> bool {
        self.transition(CallbackState::Enqueued, CallbackState::Cancelled)
    }

    /// Claim the callback for execution. Fails if it was cancelled.
    pub(crate) fn begin(&self) -> bool {
        self.transition(CallbackState::Enqueued, CallbackState::Running)
    }

    pub(crate) fn complete(&self) {
        self.state
            .store(CallbackState::Completed as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: CallbackState, to: CallbackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
