//! Event types posted on the bus

use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

use crate::{Node, Value};

/// Errors raised while constructing events
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event id must not be empty")]
    EmptyId,
}

/// Result type for event construction
pub type EventResult<T> = Result<T, EventError>;

/// Whether an event describes a durable state or a momentary occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Retained by the bus as the latest value for its id
    Stable,
    /// Delivered to subscribers, never retained
    Transient,
}

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds since the Unix epoch
///
/// Never goes backwards within the process, even if the wall clock does.
pub fn now_millis() -> i64 {
    let wall = chrono::Utc::now().timestamp_millis();
    let prev = LAST_MILLIS.fetch_max(wall, Ordering::AcqRel);
    prev.max(wall)
}

/// One immutable state observation or occurrence
///
/// Ids are hierarchical, segmented by `.` and parameterized with
/// parentheses, e.g. `zone(2).active`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: String,
    source: Node,
    timestamp: i64,
    kind: EventKind,
    value: Option<Value>,
}

impl Event {
    /// Create an event, rejecting an empty id
    pub fn new(
        source: Node,
        id: impl Into<String>,
        kind: EventKind,
        value: Option<Value>,
    ) -> EventResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(EventError::EmptyId);
        }
        Ok(Self {
            id,
            source,
            timestamp: now_millis(),
            kind,
            value,
        })
    }

    /// Create a stable event carrying a value
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty; use [`Event::new`] for untrusted ids.
    pub fn stable(source: Node, id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::literal(source, id.into(), EventKind::Stable, Some(value.into()))
    }

    /// Create a transient event carrying a value
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty; use [`Event::new`] for untrusted ids.
    pub fn transient(source: Node, id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::literal(source, id.into(), EventKind::Transient, Some(value.into()))
    }

    /// Create a transient event with no value (a pure occurrence)
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty; use [`Event::new`] for untrusted ids.
    pub fn signal(source: Node, id: impl Into<String>) -> Self {
        Self::literal(source, id.into(), EventKind::Transient, None)
    }

    fn literal(source: Node, id: String, kind: EventKind, value: Option<Value>) -> Self {
        assert!(!id.is_empty(), "event id must not be empty");
        Self {
            id,
            source,
            timestamp: now_millis(),
            kind,
            value,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Node {
        &self.source
    }

    /// Creation time in milliseconds, for display and audit only
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_stable(&self) -> bool {
        self.kind == EventKind::Stable
    }

    /// The primitive value of this event, `None` when absent
    pub fn simple_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_id() {
        let err = Event::new(Node::system(), "", EventKind::Stable, None).unwrap_err();
        assert_eq!(err, EventError::EmptyId);
    }

    #[test]
    fn test_constructors() {
        let source = Node::new("alarm");
        let e = Event::stable(source.clone(), "zone(2).active", true);
        assert_eq!(e.id(), "zone(2).active");
        assert_eq!(e.source(), &source);
        assert!(e.is_stable());
        assert_eq!(e.simple_value(), Some(&Value::Bool(true)));

        let e = Event::signal(source, "doorbell");
        assert_eq!(e.kind(), EventKind::Transient);
        assert!(e.simple_value().is_none());
    }

    #[test]
    fn test_timestamps_do_not_go_backwards() {
        let mut prev = now_millis();
        for _ in 0..1000 {
            let now = now_millis();
            assert!(now >= prev);
            prev = now;
        }
    }

    #[test]
    fn test_serialize() {
        let e = Event::transient(Node::ui(), "ui.click", "button(1)");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], "ui.click");
        assert_eq!(json["source"], "ui");
        assert_eq!(json["kind"], "transient");
        assert_eq!(json["value"], "button(1)");
    }

    #[test]
    #[should_panic(expected = "event id must not be empty")]
    fn test_literal_constructor_panics_on_empty_id() {
        let _ = Event::stable(Node::system(), "", 1);
    }
}
