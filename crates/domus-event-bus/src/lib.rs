//! Event bus with a stable-value cache and synchronous fan-out
//!
//! This crate provides the [`Bus`], the central message broker of Domus.
//! Drivers and applications post events; the bus remembers the latest
//! stable event per id and delivers every event to every registered
//! listener on the posting thread.
//!
//! Delivery is synchronous and un-queued so a producer pays a bounded cost
//! for publishing. Listeners that need to do slow work hand it off to the
//! task scheduler.

use dashmap::DashMap;
use domus_core::{panic_message, Event};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace};

/// A unique identifier for a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by a listener callback
///
/// The bus logs it and carries on delivering to the remaining listeners.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for ListenerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// Receiver of events dispatched by the [`Bus`]
pub trait EventListener: Send + Sync {
    /// Name used when logging failures of this listener
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event, on the posting thread
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

/// Listener backed by a closure, see [`Bus::subscribe_fn`]
struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        (self.f)(event)
    }
}

#[derive(Clone)]
struct Subscription {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
}

/// The event bus
///
/// The Bus is responsible for:
/// - Keeping the latest stable event per id (last write wins)
/// - Delivering every posted event to all listeners, in isolation
/// - Letting listeners come and go while events are being dispatched
pub struct Bus {
    /// Latest stable event keyed by event id
    cache: DashMap<String, Arc<Event>>,
    /// Registered listeners, replaced wholesale on every change so that a
    /// dispatch iterates over the snapshot taken when it started
    listeners: RwLock<Arc<Vec<Subscription>>>,
    /// Counter for generating unique listener IDs
    next_listener_id: AtomicU64,
}

impl Bus {
    /// Create a new, empty bus
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            listeners: RwLock::new(Arc::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Post an event
    ///
    /// Stable events replace the cached entry for their id before any
    /// listener runs. Every listener registered when the call starts then
    /// receives the event, one after another, on the calling thread. Errors
    /// and panics raised by a listener are logged and never reach the poster.
    pub fn post(&self, event: Event) {
        debug!(
            event_id = event.id(),
            kind = ?event.kind(),
            source = %event.source(),
            "Posting event"
        );

        let event = Arc::new(event);
        if event.is_stable() {
            self.cache.insert(event.id().to_string(), Arc::clone(&event));
        }

        let listeners = self.listeners.read().clone();
        for sub in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| sub.listener.on_event(&event)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(
                        listener_id = %sub.id,
                        listener = sub.listener.name(),
                        event_id = event.id(),
                        error = %err,
                        "Listener failed to handle event"
                    );
                }
                Err(payload) => {
                    error!(
                        listener_id = %sub.id,
                        listener = sub.listener.name(),
                        event_id = event.id(),
                        panic = %panic_message(payload.as_ref()),
                        "Listener panicked while handling event"
                    );
                }
            }
        }
    }

    /// Register a listener for events posted after this call returns
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        trace!(listener_id = %id, listener = listener.name(), "Subscribing listener");

        let mut guard = self.listeners.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(Subscription { id, listener });
        *guard = Arc::new(next);
        id
    }

    /// Register a closure as a listener
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, f: F) -> ListenerId
    where
        F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener {
            name: name.into(),
            f,
        }))
    }

    /// Remove a listener
    ///
    /// Returns `false` if no listener with this id is registered. A dispatch
    /// already in progress still delivers to the removed listener.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.write();
        if !guard.iter().any(|sub| sub.id == id) {
            return false;
        }
        let next: Vec<Subscription> = guard.iter().filter(|sub| sub.id != id).cloned().collect();
        *guard = Arc::new(next);
        trace!(listener_id = %id, "Unsubscribed listener");
        true
    }

    /// Get the latest stable event posted with this id
    pub fn get_latest(&self, id: &str) -> Option<Arc<Event>> {
        self.cache.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Get every cached stable event
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.cache.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Number of ids with a cached stable event
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Detach every listener
    ///
    /// The cache stays readable; events posted afterwards are cached but
    /// reach no one until a listener subscribes again.
    pub fn shutdown(&self) {
        let removed = {
            let mut guard = self.listeners.write();
            std::mem::replace(&mut *guard, Arc::new(Vec::new()))
        };
        info!(listeners = removed.len(), "Event bus shut down");
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for Bus
pub type SharedBus = Arc<Bus>;
