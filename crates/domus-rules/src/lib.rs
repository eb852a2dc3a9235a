//! Rules for Domus
//!
//! A rule pairs a trigger condition with an action. A [`RuleSet`] listens on
//! the bus, evaluates every rule against each dispatched event and hands the
//! actions of matching rules to the task scheduler, so the posting thread
//! never runs rule actions itself.

mod action;
mod error;
mod rule;

pub use action::{Action, CustomAction, RULES_NODE};
pub use error::{RuleError, RuleResult};
pub use rule::{Rule, RuleDefinition, RuleSet};
