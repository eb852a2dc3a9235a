//! Typed configuration

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;
use domus_tasks::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root of `domus.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomusConfig {
    pub tasks: SchedulerConfig,
    pub logging: LoggingConfig,
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `DOMUS_LOG`
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// A named trigger with the actions it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// Trigger condition source text
    ///
    /// A trigger starting with `!` must be quoted (`when: "!door"`), since
    /// YAML reads an unquoted leading `!` as a tag.
    pub when: String,
    #[serde(default)]
    pub then: Vec<ActionConfig>,
}

/// One action of a rule, written as `- post: {...}` or `- log: "..."`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    Post { post: PostConfig },
    Log { log: String },
}

/// Event posted by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostConfig {
    pub id: String,
    /// Omitted for a valueless signal
    #[serde(default)]
    pub value: Option<domus_core::Value>,
    #[serde(default)]
    pub transient: bool,
}

impl DomusConfig {
    /// Load and validate a configuration file
    ///
    /// `!secret` values come from `secrets.yaml` in the same directory.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut loader = YamlLoader::new(config_dir)?;
        let value = loader.load_file(path)?;

        let config = Self::from_value(value, path)?;
        info!(
            ?path,
            rules = config.rules.len(),
            max_threads = config.tasks.max_threads,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text; no secrets are available
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let value = crate::loader::load_yaml_string(content, Default::default())?;
        Self::from_value(value, Path::new("<string>"))
    }

    fn from_value(value: serde_yaml::Value, path: &Path) -> ConfigResult<Self> {
        // An empty document means all defaults
        check_unquoted_triggers(&value)?;

        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ConfigError::Schema {
                path: path.to_path_buf(),
                source: e,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.tasks
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "tasks".to_string(),
                reason: e.to_string(),
            })?;

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("rules[{index}].name"),
                    reason: "rule name must not be empty".to_string(),
                });
            }
            for action in &rule.then {
                if let ActionConfig::Post { post } = action {
                    if post.id.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            key: format!("rules[{index}].then.post.id"),
                            reason: "event id must not be empty".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Name the usual cause of a tagged `when`: an unquoted trigger starting
/// with `!`
fn check_unquoted_triggers(value: &serde_yaml::Value) -> ConfigResult<()> {
    let Some(rules) = value.get("rules").and_then(|rules| rules.as_sequence()) else {
        return Ok(());
    };
    for (index, rule) in rules.iter().enumerate() {
        if let Some(serde_yaml::Value::Tagged(tagged)) = rule.get("when") {
            return Err(ConfigError::InvalidValue {
                key: format!("rules[{index}].when"),
                reason: format!(
                    "read as YAML tag '{}'; quote triggers starting with '!'",
                    tagged.tag
                ),
            });
        }
    }
    Ok(())
}
