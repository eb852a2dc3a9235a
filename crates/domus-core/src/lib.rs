//! Core types for Domus
//!
//! This crate provides the fundamental types shared by drivers, applications
//! and the rule engine: [`Node`] (the identity of an event source), [`Event`]
//! (one immutable state observation) and [`Value`] (the simple primitive
//! value an event carries).

mod event;
mod node;
mod value;

pub use event::{now_millis, Event, EventError, EventKind, EventResult};
pub use node::Node;
pub use value::{Value, ValueKind};

/// Extract a readable message from a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Well-known events posted by the system itself
pub mod events {
    use super::*;

    /// Id of the stable event tracking the system lifecycle
    pub const SYSTEM_STATE: &str = "system.state";

    /// Lifecycle phases announced on [`SYSTEM_STATE`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SystemState {
        /// Posted before configuration and rules are loaded
        Start,
        /// Posted once every component has been initialized
        Ready,
        /// Posted when an orderly shutdown begins
        Quit,
    }

    impl SystemState {
        pub fn as_str(&self) -> &'static str {
            match self {
                SystemState::Start => "start",
                SystemState::Ready => "ready",
                SystemState::Quit => "quit",
            }
        }
    }

    impl std::fmt::Display for SystemState {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Build the stable `system.state` event for a lifecycle phase
    pub fn system_state(state: SystemState) -> Event {
        Event::stable(Node::system(), SYSTEM_STATE, state.as_str())
    }
}
