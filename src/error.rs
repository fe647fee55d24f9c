use std::thread::ThreadId;

use thiserror::Error;

/// Which binding rule a caller violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingViolation {
    /// Direct write to a property that mirrors a one-way source.
    WriteToBound,
    /// A property was asked to bind to itself.
    SelfBinding,
    /// The requested one-way binding would close a cycle of sources.
    BindingCycle,
    /// One-way and bidirectional binding were mixed on the same property.
    ModeConflict,
}

impl std::fmt::Display for BindingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingViolation::WriteToBound => write!(f, "cannot set a bound property"),
            BindingViolation::SelfBinding => write!(f, "a property cannot be bound to itself"),
            BindingViolation::BindingCycle => write!(f, "binding would create a cycle"),
            BindingViolation::ModeConflict => {
                write!(f, "one-way and bidirectional binding are mutually exclusive")
            }
        }
    }
}

/// Errors raised synchronously by property and affinity operations.
///
/// Both variants are programmer errors: callers are expected to surface them
/// rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("illegal binding state: {0}")]
    IllegalBindingState(BindingViolation),

    #[error("{operation} called from thread {actual:?}, UI thread is {expected:?}")]
    WrongThreadAccess {
        operation: &'static str,
        expected: ThreadId,
        actual: ThreadId,
    },
}

impl PropertyError {
    pub fn is_illegal_binding(&self) -> bool {
        matches!(self, PropertyError::IllegalBindingState(_))
    }

    pub fn is_wrong_thread(&self) -> bool {
        matches!(self, PropertyError::WrongThreadAccess { .. })
    }
}

impl From<BindingViolation> for PropertyError {
    fn from(violation: BindingViolation) -> Self {
        PropertyError::IllegalBindingState(violation)
    }
}

/// Errors from scheduling work on the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("UI dispatcher has shut down")]
    Closed,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
