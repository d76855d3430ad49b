//! Payload-free change notification with lock/flush semantics.
//!
//! This module provides the [`crate::notify::ChangeEvent`] type, the single notification
//! primitive shared by source files, value field codecs and value reference groups. A
//! `ChangeEvent` is an explicit observer list: consumers subscribe a callback, receive a
//! payload-free "changed" signal, and requery whatever state they depend on. No deltas are
//! delivered.
//!
//! # Architecture
//!
//! Every mutable entity owns its own `ChangeEvent`. Raising the event delivers the signal
//! synchronously to every subscriber, in subscription order, before the raising call
//! returns. A reentrant suppression counter supports atomic operations: while the counter
//! is nonzero, raises are queued as a single pending flag, and releasing the counter back
//! to zero flushes **at most one** delivery no matter how many raises were suppressed.
//!
//! # Thread Safety
//!
//! `ChangeEvent` is not [`Send`] or [`Sync`]. All subscription and delivery happens on the
//! single thread that owns the project graph.

use std::fmt;

/// Identifies one subscription on a [`ChangeEvent`], for later removal.
///
/// Handles are never reused within one event, so unsubscribing with a stale
/// handle is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

/// An explicit observer list delivering a payload-free "changed" signal.
///
/// Subscribers are plain `FnMut()` callbacks. Delivery is synchronous and ordered;
/// consumers requery state rather than receive deltas.
///
/// # Suppression
///
/// [`ChangeEvent::suppress`] increments a reentrant counter; [`ChangeEvent::release`]
/// decrements it. Raises while the counter is nonzero set a pending flag instead of
/// delivering. When the counter returns to zero with the flag set, exactly one
/// delivery is flushed. This is the mechanism behind atomic operations on value
/// reference groups.
///
/// # Cloning
///
/// Cloning a `ChangeEvent` yields a *fresh* event with no subscribers and no pending
/// state. This is deliberate: cloned codecs (for example the defensive clones taken
/// by a value reference group) must never alias the original's observer list.
#[derive(Default)]
pub struct ChangeEvent {
    handlers: Vec<(u64, Box<dyn FnMut()>)>,
    next_handle: u64,
    suppressed: u32,
    pending: bool,
}

impl ChangeEvent {
    /// Creates an event with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback to be invoked on every delivered change signal.
    ///
    /// Returns a handle for [`ChangeEvent::unsubscribe`].
    pub fn subscribe(&mut self, handler: impl FnMut() + 'static) -> SubscriberHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handlers.push((handle, Box::new(handler)));
        SubscriberHandle(handle)
    }

    /// Removes a previously registered callback.
    ///
    /// Unknown or already-removed handles are ignored.
    pub fn unsubscribe(&mut self, handle: SubscriberHandle) {
        self.handlers.retain(|(id, _)| *id != handle.0);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    /// Raises the change signal.
    ///
    /// Delivers synchronously to every subscriber unless the event is currently
    /// suppressed, in which case a single pending delivery is queued for the
    /// moment the suppression counter returns to zero.
    pub fn raise(&mut self) {
        if self.suppressed > 0 {
            self.pending = true;
            return;
        }
        for (_, handler) in &mut self.handlers {
            handler();
        }
    }

    /// Increments the reentrant suppression counter.
    pub fn suppress(&mut self) {
        self.suppressed += 1;
    }

    /// Decrements the suppression counter, flushing at most one queued delivery
    /// when it returns to zero.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already zero; an unbalanced release is an
    /// internal-consistency failure.
    pub fn release(&mut self) {
        assert!(
            self.suppressed > 0,
            "ChangeEvent::release without matching suppress"
        );
        self.suppressed -= 1;
        if self.suppressed == 0 && self.pending {
            self.pending = false;
            for (_, handler) in &mut self.handlers {
                handler();
            }
        }
    }

    /// True while at least one suppression is active.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed > 0
    }
}

impl Clone for ChangeEvent {
    fn clone(&self) -> Self {
        // Subscriptions are identity-bound; a clone starts with a fresh observer list.
        Self::new()
    }
}

impl fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("subscribers", &self.handlers.len())
            .field("suppressed", &self.suppressed)
            .field("pending", &self.pending)
            .finish()
    }
}
