//! The running Domus instance

use anyhow::{Context, Result};
use domus_config::DomusConfig;
use domus_core::events::{system_state, SystemState};
use domus_event_bus::{Bus, ListenerId, SharedBus};
use domus_rules::RuleSet;
use domus_tasks::{Scheduler, SharedScheduler};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::signals::wait_for_shutdown_signal;

/// The central Domus instance
pub struct Domus {
    /// Event bus shared by drivers, rules and applications
    pub bus: SharedBus,
    /// Worker and system pools
    pub scheduler: SharedScheduler,
    config: DomusConfig,
    rules: Option<ListenerId>,
}

impl Domus {
    /// Create the bus and scheduler, load rules and announce readiness
    #[instrument(skip_all)]
    pub fn start(config: DomusConfig) -> Result<Self> {
        let bus = Arc::new(Bus::new());
        let scheduler = Arc::new(
            Scheduler::new(config.tasks.clone()).context("failed to start task scheduler")?,
        );
        bus.post(system_state(SystemState::Start));

        let (rules, errors) = RuleSet::from_config(&bus, Arc::clone(&scheduler), &config.rules);
        for e in &errors {
            error!(rule = e.rule(), error = %e, "Rule not loaded");
        }
        let rules = if rules.is_empty() {
            None
        } else {
            info!(count = rules.len(), "Rules active");
            Some(bus.subscribe(Arc::new(rules)))
        };

        bus.post(system_state(SystemState::Ready));
        info!("Domus is ready");

        Ok(Self {
            bus,
            scheduler,
            config,
            rules,
        })
    }

    /// Block the calling thread until a termination signal arrives
    pub fn wait_for_shutdown(&self) -> Result<()> {
        self.scheduler
            .block_on(wait_for_shutdown_signal())
            .context("task scheduler already stopped")?
            .context("failed to listen for termination signals")?;
        info!("Termination signal received");
        Ok(())
    }

    /// Announce shutdown, drain the scheduler and detach all listeners
    #[instrument(skip_all)]
    pub fn stop(self) {
        info!("Shutting down");
        self.bus.post(system_state(SystemState::Quit));

        if let Some(id) = self.rules {
            self.bus.unsubscribe(id);
        }
        self.scheduler.shutdown(self.config.tasks.shutdown_timeout());
        self.bus.shutdown();
        info!("Domus stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domus_core::events::SYSTEM_STATE;
    use domus_core::Value;
    use std::sync::Mutex;
    use std::time::Duration;

    const CONFIG: &str = r#"
tasks:
  max_threads: 4
  shutdown_timeout_secs: 2
rules:
  - name: greet
    when: system.state == "ready"
    then:
      - post: { id: greeting, value: hello }
  - name: broken
    when: "temp >"
"#;

    #[test]
    fn test_start_announces_ready_and_runs_rules() {
        let config = DomusConfig::from_yaml(CONFIG).unwrap();
        let domus = Domus::start(config).unwrap();

        let state = domus.bus.get_latest(SYSTEM_STATE).unwrap();
        assert_eq!(state.simple_value(), Some(&Value::from("ready")));
        assert_eq!(domus.bus.listener_count(), 1);

        for _ in 0..200 {
            if domus.bus.get_latest("greeting").is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let greeting = domus.bus.get_latest("greeting").unwrap();
        assert_eq!(greeting.simple_value(), Some(&Value::from("hello")));
        domus.stop();
    }

    #[test]
    fn test_stop_posts_quit_and_drains() {
        let domus = Domus::start(DomusConfig::from_yaml("tasks:\n  max_threads: 2\n").unwrap())
            .unwrap();
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        domus.bus.subscribe_fn("state-watcher", move |event| {
            if event.id() == SYSTEM_STATE {
                sink.lock().unwrap().push(event.simple_value().cloned());
            }
            Ok(())
        });

        let bus = Arc::clone(&domus.bus);
        let scheduler = Arc::clone(&domus.scheduler);
        domus.stop();

        assert_eq!(*states.lock().unwrap(), vec![Some(Value::from("quit"))]);
        assert!(scheduler.is_shut_down());
        assert_eq!(bus.listener_count(), 0);
        assert!(bus.get_latest(SYSTEM_STATE).is_some());
    }
}
