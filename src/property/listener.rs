use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Change listener: receives `(old, new)` after the value changed.
pub type ListenerFn<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered listener, used to remove it again.
///
/// Ids are unique across all properties, so removing an id from the wrong
/// property is a no-op rather than removing someone else's listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registration-ordered listener storage.
pub(crate) struct ListenerList<T> {
    entries: Vec<(ListenerId, ListenerFn<T>)>,
}

impl<T> ListenerList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, listener: ListenerFn<T>) -> ListenerId {
        let id = ListenerId::next();
        self.insert(id, listener);
        id
    }

    /// Register under an id handed out beforehand.
    pub(crate) fn insert(&mut self, id: ListenerId, listener: ListenerFn<T>) {
        self.entries.push((id, listener));
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Listeners to call for one notification, in registration order.
    ///
    /// Taken as a snapshot so callbacks run without the property lock held.
    pub(crate) fn snapshot(&self) -> Vec<ListenerFn<T>> {
        self.entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// RAII guard for a listener registered with `Property::subscribe`.
///
/// Dropping the guard removes the listener.
pub struct Subscription {
    id: ListenerId,
    detach: Option<Box<dyn FnOnce(ListenerId) + Send>>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, detach: Box<dyn FnOnce(ListenerId) + Send>) -> Self {
        Self {
            id,
            detach: Some(detach),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
