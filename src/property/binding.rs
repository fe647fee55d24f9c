use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{BindingViolation, PropertyError};
use crate::property::{ListenerFn, ListenerId, Property, PropertyInner};

/// A dependent's record of the source it mirrors.
pub(super) struct OneWayLink<T> {
    pub(super) source: Property<T>,
    pub(super) forwarder: ListenerId,
}

/// One side of a bidirectional pair. Both sides share `syncing`.
pub(super) struct PeerLink<T> {
    peer: Weak<PropertyInner<T>>,
    syncing: Arc<AtomicBool>,
}

impl<T: Clone + PartialEq + Send + 'static> PeerLink<T> {
    pub(super) fn upgrade(&self) -> Option<(Property<T>, Arc<AtomicBool>)> {
        self.peer
            .upgrade()
            .map(|inner| (Property::from_inner(inner), Arc::clone(&self.syncing)))
    }

    fn points_to(&self, property: &Property<T>) -> bool {
        Weak::ptr_eq(&self.peer, &property.downgrade())
    }
}

/// The link a propagated value travelled through.
pub(super) enum Origin {
    /// A one-way source, identified by the forwarder it registered.
    Source(ListenerId),
    /// A bidirectional peer, identified by the pair's shared guard.
    Peer(Arc<AtomicBool>),
}

impl Origin {
    /// True while this link is still the one attached to `property`.
    pub(super) fn still_feeds<T>(&self, property: &Property<T>) -> bool {
        let state = property.inner.state.lock();
        match self {
            Origin::Source(forwarder) => state
                .bound
                .as_ref()
                .is_some_and(|link| link.forwarder == *forwarder),
            Origin::Peer(syncing) => state.peer.as_ref().is_some_and(|link| {
                Arc::ptr_eq(&link.syncing, syncing) && link.peer.strong_count() > 0
            }),
        }
    }
}

/// Forward `value` to `peer` unless this pair is already mid-propagation.
///
/// The guard is set for the duration of the peer's write, so when the peer
/// in turn tries to forward back, it finds the flag up and stops.
pub(super) fn propagate_to_peer<T: Clone + PartialEq + Send + 'static>(
    peer: &Property<T>,
    syncing: Arc<AtomicBool>,
    value: T,
) {
    if syncing.swap(true, Ordering::AcqRel) {
        return;
    }
    let origin = Origin::Peer(Arc::clone(&syncing));
    let _reset = scopeguard::guard(syncing, |flag| flag.store(false, Ordering::Release));
    peer.deliver(value, origin);
}

impl<T: Clone + PartialEq + Send + 'static> Property<T> {
    /// Mirror `source`: pull its value now and follow every later change.
    ///
    /// An existing one-way binding is replaced.
    ///
    /// # Errors
    ///
    /// `IllegalBindingState` when binding to itself, when the property is
    /// bidirectionally bound, or when `source` already (transitively) mirrors
    /// this property.
    pub fn bind(&self, source: &Property<T>) -> Result<(), PropertyError> {
        self.check_affinity("bind")?;
        if self.ptr_eq(source) {
            return Err(BindingViolation::SelfBinding.into());
        }
        if self.is_bound_bidirectionally() {
            return Err(BindingViolation::ModeConflict.into());
        }
        if source.depends_on(self) {
            return Err(BindingViolation::BindingCycle.into());
        }

        self.detach_source();

        let target = self.downgrade();
        let forwarder = ListenerId::next();
        let forward: ListenerFn<T> = Arc::new(move |_: &T, new: &T| {
            if let Some(inner) = target.upgrade() {
                Property::from_inner(inner).deliver(new.clone(), Origin::Source(forwarder));
            }
        });
        source.inner.state.lock().listeners.insert(forwarder, forward);
        self.inner.state.lock().bound = Some(OneWayLink {
            source: source.clone(),
            forwarder,
        });

        tracing::debug!(
            property = self.label(),
            source = source.label(),
            "Bound one-way"
        );

        self.write(source.get());
        Ok(())
    }

    /// Stop mirroring the source. No-op when not bound.
    pub fn unbind(&self) -> Result<(), PropertyError> {
        self.check_affinity("unbind")?;
        self.detach_source();
        Ok(())
    }

    /// True while this property mirrors a one-way source.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.state.lock().bound.is_some()
    }

    /// The source this property mirrors, if any.
    pub fn bound_source(&self) -> Option<Property<T>> {
        self.inner
            .state
            .lock()
            .bound
            .as_ref()
            .map(|link| link.source.clone())
    }

    /// Keep this property and `peer` equal in both directions.
    ///
    /// This property takes `peer`'s current value. Existing bidirectional
    /// bindings of either side are replaced.
    ///
    /// # Errors
    ///
    /// `IllegalBindingState` when binding to itself or when either side is
    /// one-way bound.
    pub fn bind_bidirectional(&self, peer: &Property<T>) -> Result<(), PropertyError> {
        self.check_affinity("bind_bidirectional")?;
        peer.check_affinity("bind_bidirectional")?;
        if self.ptr_eq(peer) {
            return Err(BindingViolation::SelfBinding.into());
        }
        if self.is_bound() || peer.is_bound() {
            return Err(BindingViolation::ModeConflict.into());
        }
        if self.peer().is_some_and(|current| current.ptr_eq(peer)) {
            return Ok(());
        }

        self.detach_peer();
        peer.detach_peer();

        let syncing = Arc::new(AtomicBool::new(false));
        self.inner.state.lock().peer = Some(PeerLink {
            peer: peer.downgrade(),
            syncing: Arc::clone(&syncing),
        });
        peer.inner.state.lock().peer = Some(PeerLink {
            peer: self.downgrade(),
            syncing,
        });

        tracing::debug!(
            property = self.label(),
            peer = peer.label(),
            "Bound bidirectionally"
        );

        self.write(peer.get());
        Ok(())
    }

    /// Dissolve the bidirectional pair on both sides. No-op when unpaired.
    pub fn unbind_bidirectional(&self) -> Result<(), PropertyError> {
        self.check_affinity("unbind_bidirectional")?;
        self.detach_peer();
        Ok(())
    }

    /// True while this property has a live bidirectional peer.
    #[must_use]
    pub fn is_bound_bidirectionally(&self) -> bool {
        self.peer().is_some()
    }

    fn peer(&self) -> Option<Property<T>> {
        self.inner
            .state
            .lock()
            .peer
            .as_ref()
            .and_then(PeerLink::upgrade)
            .map(|(peer, _)| peer)
    }

    /// Walks the chain of one-way sources looking for `other`.
    fn depends_on(&self, other: &Property<T>) -> bool {
        let mut cursor = self.bound_source();
        while let Some(source) = cursor {
            if source.ptr_eq(other) {
                return true;
            }
            cursor = source.bound_source();
        }
        false
    }

    fn detach_source(&self) {
        // Take the link first: the source's lock must not nest inside ours.
        let link = self.inner.state.lock().bound.take();
        if let Some(link) = link {
            link.source.remove_listener(link.forwarder);
            tracing::debug!(
                property = self.label(),
                source = link.source.label(),
                "Unbound one-way"
            );
        }
    }

    fn detach_peer(&self) {
        let link = self.inner.state.lock().peer.take();
        let Some((peer, _)) = link.as_ref().and_then(PeerLink::upgrade) else {
            return;
        };
        let mut peer_state = peer.inner.state.lock();
        if peer_state
            .peer
            .as_ref()
            .is_some_and(|back| back.points_to(self))
        {
            peer_state.peer = None;
        }
        drop(peer_state);
        tracing::debug!(
            property = self.label(),
            peer = peer.label(),
            "Unbound bidirectionally"
        );
    }
}
