//! Observable properties with one-way and bidirectional binding.
//!
//! A [`Property<T>`] is a shared, clonable handle to a single value cell.
//! Listeners registered on it are called with `(old, new)` after every
//! change, synchronously and in registration order, on the thread that made
//! the change.
//!
//! # Invariants
//!
//! 1. Setting a value equal to the current one is a no-op: no version bump,
//!    no notifications.
//! 2. A one-way bound property always mirrors its source; external `set`
//!    calls on it fail with `IllegalBindingState`.
//! 3. Bidirectional peers are kept equal, and a write propagates to the peer
//!    exactly once (a per-pair in-progress guard stops the echo).
//! 4. One-way and bidirectional binding are mutually exclusive per property.
//! 5. The internal lock is never held while listeners run.
//!
//! # UI affinity
//!
//! A property created with [`Property::with_affinity`] is UI-owned state:
//! mutating operations called off the UI thread fail with
//! `WrongThreadAccess`. Values propagated into it from another thread (by a
//! one-way source or a peer) are marshalled onto the UI thread instead.

mod binding;
mod listener;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::dispatch::DispatcherHandle;
use crate::error::{BindingViolation, PropertyError};

pub use listener::{ListenerFn, ListenerId, Subscription};

use binding::{OneWayLink, Origin, PeerLink};
use listener::ListenerList;

struct PropertyState<T> {
    value: T,
    version: u64,
    listeners: ListenerList<T>,
    bound: Option<OneWayLink<T>>,
    peer: Option<PeerLink<T>>,
}

struct PropertyInner<T> {
    name: Option<String>,
    affinity: Option<DispatcherHandle>,
    state: Mutex<PropertyState<T>>,
}

impl<T> Drop for PropertyInner<T> {
    fn drop(&mut self) {
        // Detach our forwarding listener so the source stops carrying it.
        if let Some(link) = self.state.get_mut().bound.take() {
            link.source
                .inner
                .state
                .lock()
                .listeners
                .remove(link.forwarder);
        }
    }
}

/// A typed, observable value cell.
///
/// Cloning yields another handle to the same cell.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Property")
            .field("name", &self.inner.name)
            .field("value", &state.value)
            .field("version", &state.version)
            .field("listeners", &state.listeners.len())
            .field("bound", &state.bound.is_some())
            .field("bidirectional", &state.peer.is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq + Send + 'static> Property<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                name: None,
                affinity: None,
                state: Mutex::new(PropertyState {
                    value,
                    version: 0,
                    listeners: ListenerList::new(),
                    bound: None,
                    peer: None,
                }),
            }),
        }
    }

    /// Create a UI-owned property tied to `ui`'s thread.
    #[must_use]
    pub fn with_affinity(value: T, ui: &DispatcherHandle) -> Self {
        let mut property = Self::new(value);
        if let Some(inner) = Arc::get_mut(&mut property.inner) {
            inner.affinity = Some(ui.clone());
        }
        property
    }

    /// Attach a name used in log output. Only effective on a fresh property
    /// that has not been cloned or bound yet.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.name = Some(name.into());
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn is_ui_owned(&self) -> bool {
        self.inner.affinity.is_some()
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// `f` must not touch this property: the cell stays locked while it runs.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.lock().value)
    }

    /// Number of value changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.lock().version
    }

    /// Set a new value and notify listeners if it differs from the current one.
    ///
    /// # Errors
    ///
    /// `IllegalBindingState` if the property is one-way bound;
    /// `WrongThreadAccess` if it is UI-owned and called off the UI thread.
    pub fn set(&self, value: T) -> Result<(), PropertyError> {
        self.check_affinity("set")?;
        if self.inner.state.lock().bound.is_some() {
            return Err(BindingViolation::WriteToBound.into());
        }
        self.write(value);
        Ok(())
    }

    /// Register a change listener. Keep the returned id to remove it.
    pub fn add_listener(&self, listener: impl Fn(&T, &T) + Send + Sync + 'static) -> ListenerId {
        self.add_listener_arc(Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.state.lock().listeners.remove(id)
    }

    /// Register a listener that is removed when the returned guard drops.
    pub fn subscribe(&self, listener: impl Fn(&T, &T) + Send + Sync + 'static) -> Subscription {
        let id = self.add_listener(listener);
        let target = Arc::downgrade(&self.inner);
        Subscription::new(
            id,
            Box::new(move |id| {
                if let Some(inner) = target.upgrade() {
                    inner.state.lock().listeners.remove(id);
                }
            }),
        )
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// True if both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Property<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn add_listener_arc(&self, listener: ListenerFn<T>) -> ListenerId {
        self.inner.state.lock().listeners.push(listener)
    }

    fn check_affinity(&self, operation: &'static str) -> Result<(), PropertyError> {
        match &self.inner.affinity {
            Some(ui) => ui.check_thread(operation),
            None => Ok(()),
        }
    }

    fn downgrade(&self) -> Weak<PropertyInner<T>> {
        Arc::downgrade(&self.inner)
    }

    fn from_inner(inner: Arc<PropertyInner<T>>) -> Self {
        Self { inner }
    }

    fn label(&self) -> &str {
        self.inner.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Internal write path: skips the bound check, still honours equality,
    /// and forwards to the bidirectional peer unless that peer is the one
    /// currently writing into us.
    fn write(&self, value: T) {
        self.update(value, true);
    }

    /// Store `value` and notify listeners. With `forward`, a live peer gets
    /// the value too, even when a listener panics.
    fn update(&self, value: T, forward: bool) {
        let (old, new, listeners, peer) = {
            let mut state = self.inner.state.lock();
            if state.value == value {
                return;
            }
            let new = value.clone();
            let old = std::mem::replace(&mut state.value, value);
            state.version += 1;
            let peer = if forward {
                state.peer.as_ref().and_then(PeerLink::upgrade)
            } else {
                None
            };
            (old, new, state.listeners.snapshot(), peer)
        };

        let notified = panic::catch_unwind(AssertUnwindSafe(|| {
            for listener in &listeners {
                listener(&old, &new);
            }
        }));

        if let Some((peer, guard)) = peer {
            binding::propagate_to_peer(&peer, guard, new);
        }

        if let Err(payload) = notified {
            panic::resume_unwind(payload);
        }
    }

    /// Apply a propagated value, hopping to the UI thread when this property
    /// is UI-owned and we are elsewhere. The hop re-checks that `origin` is
    /// still the link feeding this property, so a value from a removed or
    /// replaced binding is dropped.
    fn deliver(&self, value: T, origin: Origin) {
        match &self.inner.affinity {
            Some(ui) if !ui.is_ui_thread() => {
                let target = self.downgrade();
                let scheduled = ui.run_on_ui_thread(move || {
                    let Some(inner) = target.upgrade() else {
                        return;
                    };
                    let property = Property::from_inner(inner);
                    if !origin.still_feeds(&property) {
                        tracing::trace!(property = property.label(), "Skipped stale value");
                        return;
                    }
                    match origin {
                        Origin::Source(_) => property.write(value),
                        // The peer already holds this value; sending it back
                        // could overwrite a newer one.
                        Origin::Peer(_) => property.update(value, false),
                    }
                });
                if let Err(err) = scheduled {
                    tracing::warn!(property = self.label(), "Dropped propagated value: {}", err);
                }
            }
            _ => self.write(value),
        }
    }
}

/// Read side of bindable state, for components that only observe a value.
pub trait ObservableValue<T> {
    fn value(&self) -> T;
    fn add_change_listener(&self, listener: ListenerFn<T>) -> ListenerId;
    fn remove_change_listener(&self, id: ListenerId) -> bool;
}

/// Write side of bindable state.
pub trait WritableValue<T>: ObservableValue<T> {
    fn set_value(&self, value: T) -> Result<(), PropertyError>;
}

impl<T: Clone + PartialEq + Send + 'static> ObservableValue<T> for Property<T> {
    fn value(&self) -> T {
        self.get()
    }

    fn add_change_listener(&self, listener: ListenerFn<T>) -> ListenerId {
        self.add_listener_arc(listener)
    }

    fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.remove_listener(id)
    }
}

impl<T: Clone + PartialEq + Send + 'static> WritableValue<T> for Property<T> {
    fn set_value(&self, value: T) -> Result<(), PropertyError> {
        self.set(value)
    }
}
