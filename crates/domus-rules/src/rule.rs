//! Rules and the rule set listening on the bus

use domus_config::RuleConfig;
use domus_core::Event;
use domus_event_bus::{Bus, EventListener, ListenerError, SharedBus};
use domus_tasks::{SchedulerError, SharedScheduler};
use domus_trigger::{compile, TriggerCondition};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

use crate::action::Action;
use crate::error::{RuleError, RuleResult};

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    name: Arc<str>,
    trigger: TriggerCondition,
    action: Action,
}

impl Rule {
    /// Compile a rule's trigger
    pub fn compile(name: impl Into<String>, source: &str, action: Action) -> RuleResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RuleError::Invalid {
                rule: name,
                reason: "rule name must not be empty".to_string(),
            });
        }
        let trigger = compile(source).map_err(|source| RuleError::Compile {
            rule: name.clone(),
            source,
        })?;
        Ok(Self {
            name: name.into(),
            trigger,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &TriggerCondition {
        &self.trigger
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// Uncompiled rule
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub name: String,
    pub when: String,
    pub action: Action,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, when: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            when: when.into(),
            action,
        }
    }
}

impl From<&RuleConfig> for RuleDefinition {
    fn from(config: &RuleConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.when.clone(),
            Action::from_config(&config.then),
        )
    }
}

/// Rules evaluated against the events on the bus
///
/// A rule is evaluated only for events its trigger references, so an action
/// posting an unrelated event cannot fire its own rule again.
///
/// Subscribe it with [`Bus::subscribe`]. The set only holds a weak reference
/// to the bus, so subscribing it does not keep the bus alive.
pub struct RuleSet {
    rules: Vec<Rule>,
    bus: Weak<Bus>,
    scheduler: SharedScheduler,
}

impl RuleSet {
    /// Compile rule definitions
    ///
    /// Rules that fail to compile or repeat an earlier name are skipped and
    /// reported in the returned error list.
    pub fn load<I>(
        bus: &SharedBus,
        scheduler: SharedScheduler,
        definitions: I,
    ) -> (Self, Vec<RuleError>)
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        let mut rules = Vec::new();
        let mut errors = Vec::new();
        let mut names = HashSet::new();

        for definition in definitions {
            if names.contains(definition.name.as_str()) {
                warn!(rule = %definition.name, "Skipping rule with duplicate name");
                errors.push(RuleError::Duplicate(definition.name));
                continue;
            }
            match Rule::compile(definition.name, &definition.when, definition.action) {
                Ok(rule) => {
                    debug!(rule = rule.name(), trigger = %rule.trigger(), "Compiled rule");
                    names.insert(rule.name().to_string());
                    rules.push(rule);
                }
                Err(e) => {
                    warn!(rule = e.rule(), error = %e, "Skipping rule that failed to compile");
                    errors.push(e);
                }
            }
        }

        info!(loaded = rules.len(), failed = errors.len(), "Loaded rules");
        let set = Self {
            rules,
            bus: Arc::downgrade(bus),
            scheduler,
        };
        (set, errors)
    }

    /// Compile the rules of a configuration
    pub fn from_config(
        bus: &SharedBus,
        scheduler: SharedScheduler,
        configs: &[RuleConfig],
    ) -> (Self, Vec<RuleError>) {
        Self::load(bus, scheduler, configs.iter().map(RuleDefinition::from))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name() == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn fire(&self, rule: &Rule, event: &Event) {
        let task_name = format!("rule:{}", rule.name);
        let name = Arc::clone(&rule.name);
        let action = rule.action.clone();
        let trigger = event.clone();
        let bus = self.bus.clone();

        let submitted = self.scheduler.submit(task_name, move |ctx| {
            let Some(bus) = bus.upgrade() else {
                debug!(rule = %name, "Bus gone, dropping rule action");
                return Ok(());
            };
            action.execute(&name, &trigger, &bus, &ctx)
        });

        match submitted {
            Ok(_) => trace!(rule = rule.name(), event = event.id(), "Rule fired"),
            Err(SchedulerError::ShutDown) => {
                debug!(rule = rule.name(), "Scheduler shut down, rule not run")
            }
            Err(e) => warn!(rule = rule.name(), error = %e, "Failed to submit rule action"),
        }
    }
}

impl EventListener for RuleSet {
    fn name(&self) -> &str {
        "rules"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        let Some(bus) = self.bus.upgrade() else {
            return Ok(());
        };

        for rule in &self.rules {
            if !rule.trigger.references(event.id()) {
                continue;
            }
            match rule.trigger.eval(event, &bus) {
                Ok(true) => self.fire(rule, event),
                Ok(false) => {}
                Err(e) => {
                    warn!(rule = rule.name(), event = event.id(), error = %e, "Rule trigger failed")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domus_core::Node;
    use domus_tasks::{Scheduler, SchedulerConfig};
    use std::time::Duration;

    fn setup() -> (SharedBus, SharedScheduler) {
        let bus = Arc::new(Bus::new());
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::with_max_threads(4)).unwrap());
        (bus, scheduler)
    }

    #[test]
    fn test_compile_error_carries_rule_name() {
        let err = Rule::compile("broken", "door & (", Action::log("x")).unwrap_err();
        assert_eq!(err.rule(), "broken");
        assert!(err.to_string().starts_with("rule 'broken': line 1:"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Rule::compile(" ", "door", Action::log("x")).unwrap_err();
        assert!(matches!(err, RuleError::Invalid { .. }));
    }

    #[test]
    fn test_load_skips_bad_and_duplicate_rules() {
        let (bus, scheduler) = setup();
        let (rules, errors) = RuleSet::load(
            &bus,
            scheduler,
            vec![
                RuleDefinition::new("bell", "doorbell", Action::log("ding")),
                RuleDefinition::new("broken", "temp >", Action::log("x")),
                RuleDefinition::new("bell", "door", Action::log("dup")),
            ],
        );

        assert_eq!(rules.len(), 1);
        assert!(rules.get("bell").is_some());
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], RuleError::Compile { ref rule, .. } if rule == "broken"));
        assert!(matches!(errors[1], RuleError::Duplicate(ref rule) if rule == "bell"));
    }

    #[test]
    fn test_type_mismatch_skips_only_that_rule() {
        let (bus, scheduler) = setup();
        let (rules, _) = RuleSet::load(
            &bus,
            Arc::clone(&scheduler),
            vec![
                RuleDefinition::new("typed", "mode == 1", Action::post("typed.fired", true)),
                RuleDefinition::new("plain", "mode", Action::post("plain.fired", true)),
            ],
        );
        bus.subscribe(Arc::new(rules));

        bus.post(Event::stable(Node::new("panel"), "mode", "away"));
        scheduler.shutdown(Duration::from_secs(5));

        assert!(bus.get_latest("typed.fired").is_none());
        assert!(bus.get_latest("plain.fired").is_some());
    }
}
