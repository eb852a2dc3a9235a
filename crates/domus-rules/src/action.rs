//! Rule actions

use anyhow::Context;
use domus_config::ActionConfig;
use domus_core::{Event, EventKind, Node, Value};
use domus_event_bus::Bus;
use domus_tasks::TaskContext;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Source node of events posted by rules
pub const RULES_NODE: &str = "rules";

/// Closure run as an action, given the event that fired the rule
pub type CustomAction = Arc<dyn Fn(&Event, &TaskContext) -> anyhow::Result<()> + Send + Sync>;

/// What a rule does when its trigger matches
#[derive(Clone)]
pub enum Action {
    /// Post an event from the `rules` node
    Post {
        id: String,
        value: Option<Value>,
        transient: bool,
    },
    /// Write a message to the log
    Log { message: String },
    /// Run embedded code
    Custom(CustomAction),
    /// Run actions in order, stopping at the first failure
    Sequence(Vec<Action>),
}

impl Action {
    pub fn post(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Post {
            id: id.into(),
            value: Some(value.into()),
            transient: false,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Event, &TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Build the action of a configured rule
    pub fn from_config(actions: &[ActionConfig]) -> Self {
        let mut actions: Vec<Self> = actions
            .iter()
            .map(|action| match action {
                ActionConfig::Post { post } => Self::Post {
                    id: post.id.clone(),
                    value: post.value.clone(),
                    transient: post.transient,
                },
                ActionConfig::Log { log } => Self::log(log.clone()),
            })
            .collect();

        if actions.len() == 1 {
            actions.remove(0)
        } else {
            Self::Sequence(actions)
        }
    }

    /// Run the action for the event that fired `rule`
    pub fn execute(
        &self,
        rule: &str,
        trigger: &Event,
        bus: &Bus,
        ctx: &TaskContext,
    ) -> anyhow::Result<()> {
        match self {
            Self::Post {
                id,
                value,
                transient,
            } => {
                let kind = if *transient {
                    EventKind::Transient
                } else {
                    EventKind::Stable
                };
                let event = Event::new(Node::new(RULES_NODE), id.as_str(), kind, value.clone())
                    .with_context(|| format!("rule '{rule}' cannot post '{id}'"))?;
                debug!(rule, id = %id, "Rule posting event");
                bus.post(event);
            }
            Self::Log { message } => {
                info!(rule, trigger = trigger.id(), "{}", message);
            }
            Self::Custom(f) => f(trigger, ctx)?,
            Self::Sequence(actions) => {
                for action in actions {
                    if ctx.is_interrupted() {
                        debug!(rule, "Rule interrupted");
                        break;
                    }
                    action.execute(rule, trigger, bus, ctx)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post {
                id,
                value,
                transient,
            } => f
                .debug_struct("Post")
                .field("id", id)
                .field("value", value)
                .field("transient", transient)
                .finish(),
            Self::Log { message } => f.debug_struct("Log").field("message", message).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Sequence(actions) => f.debug_tuple("Sequence").field(actions).finish(),
        }
    }
}
