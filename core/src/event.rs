//! Lightweight observer lists used by the workspace to notify front-ends.
//!
//! A front-end registers a callback with [`Listener::new`] and keeps the returned
//! handle alive for as long as it wants to be notified. The list itself only holds
//! weak references, so dropping the handle is all it takes to unsubscribe.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_skiplist::SkipMap;

/// Marker for values the workspace broadcasts.
pub trait Event: fmt::Debug + Send + Sync + 'static {}

type Callback<E> = dyn Fn(&E) + Send + Sync;

static NEXT_REGISTRATION: AtomicUsize = AtomicUsize::new(0);

/// The listeners registered for one event type `E`, keyed and called in
/// registration order.
pub struct ListenerList<E: Event> {
    inner: SkipMap<usize, Weak<Callback<E>>>,
}

impl<E: Event> ListenerList<E> {
    pub fn new() -> Self {
        ListenerList {
            inner: SkipMap::new(),
        }
    }

    /// Calls every live listener with `event` and prunes registrations whose
    /// [`Listener`] has been dropped.
    pub(crate) fn dispatch(&self, event: &E) {
        for entry in self.inner.iter() {
            match entry.value().upgrade() {
                Some(callback) => callback(event),
                None => {
                    entry.remove();
                }
            }
        }
    }

    fn registrations(&self) -> usize {
        self.inner.len()
    }
}

impl<E: Event> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("registrations", &self.registrations())
            .finish()
    }
}

/// An active registration. Dropping it deregisters the callback.
pub struct Listener<E: Event> {
    _callback: Arc<Callback<E>>,
    registration: usize,
}

impl<E: Event> Listener<E> {
    /// Registers `callback` with `listeners`.
    pub fn new<F>(listeners: &ListenerList<E>, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let registration = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        let callback: Arc<Callback<E>> = Arc::new(callback);
        listeners.inner.insert(registration, Arc::downgrade(&callback));
        Listener {
            _callback: callback,
            registration,
        }
    }
}

impl<E: Event> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("registration", &self.registration)
            .finish()
    }
}

/// Declares a struct with one public `ListenerList` field per event type.
macro_rules! define_event_listeners {
    ($struct_name:ident { $($field_name:ident: $event_type:ty),* $(,)? }) => {
        /// Listener lists for the events emitted by this component.
        #[derive(Debug, Default)]
        pub struct $struct_name {
            $(
                pub $field_name: $crate::event::ListenerList<$event_type>,
            )*
        }

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

pub(crate) use define_event_listeners;
