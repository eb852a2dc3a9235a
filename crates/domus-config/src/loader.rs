//! YAML loader with custom tag support

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader resolving `!include`, `!secret` and `!env_var`
pub struct YamlLoader {
    /// Base directory for relative paths and `secrets.yaml`
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a loader for a config directory, reading its `secrets.yaml`
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    /// Create a loader with pre-loaded secrets
    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(?path, "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);
        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let v = self.process_value(v, source_path)?;
                    result.insert(k, v);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn process_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(%tag, "Processing tag");

        match tag.as_str() {
            "!include" => self.process_include(tagged.value, source_path),
            "!secret" => self.process_secret(tagged.value),
            "!env_var" => process_env_var(tagged.value),
            _ => {
                // Unknown tags are kept for the schema to interpret
                let value = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    fn process_include(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        let Value::String(relative) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!include".to_string(),
                reason: "include path must be a string".to_string(),
            });
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        let path = base_dir.join(&relative);
        if !path.exists() {
            return Err(ConfigError::IncludeNotFound { path });
        }
        debug!(?path, "Including file");
        self.load_file(path)
    }

    fn process_secret(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(key) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!secret".to_string(),
                reason: "secret key must be a string".to_string(),
            });
        };
        let secret = self.secrets.get(&key)?.clone();
        debug!(%key, "Substituted secret");
        Ok(secret)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

/// `!env_var NAME` or `!env_var NAME default`
fn process_env_var(value: Value) -> ConfigResult<Value> {
    let Value::String(spec) = value else {
        return Err(ConfigError::InvalidValue {
            key: "!env_var".to_string(),
            reason: "environment variable name must be a string".to_string(),
        });
    };

    let (name, default) = match spec.split_once(char::is_whitespace) {
        Some((name, default)) => (name, Some(default.trim())),
        None => (spec.as_str(), None),
    };

    let raw = match (std::env::var(name), default) {
        (Ok(value), _) => value,
        (Err(_), Some(default)) => default.to_string(),
        (Err(_), None) => {
            return Err(ConfigError::EnvVarNotFound {
                var: name.to_string(),
            })
        }
    };
    debug!(var = name, "Substituted environment variable");

    // Re-read as YAML so numbers and booleans keep their type
    Ok(serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw)))
}

/// Load a YAML file relative to a config directory
pub fn load_yaml(config_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir.as_ref())?;
    loader.load_file(file)
}

/// Process a YAML string with the given secrets, without touching the filesystem
/// unless it contains `!include`
pub fn load_yaml_string(content: &str, secrets: Secrets) -> ConfigResult<Value> {
    let mut loader = YamlLoader::with_secrets(".", secrets);
    loader.load_string(content, Path::new("<string>"))
}
