//! Secrets referenced with `!secret`

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Secrets loaded from `secrets.yaml`
///
/// Values keep their YAML type, so a secret port number substitutes as a
/// number.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    secrets: HashMap<String, Value>,
}

impl Secrets {
    /// Load `secrets.yaml` from a directory; a missing file yields no secrets
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join("secrets.yaml");
        if !path.exists() {
            debug!(?path, "No secrets file, using empty secrets");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let secrets: HashMap<String, Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        debug!(?path, count = secrets.len(), "Loaded secrets");
        Ok(Self { secrets })
    }

    /// Build secrets from in-memory pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            secrets: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a secret by key
    pub fn get(&self, key: &str) -> ConfigResult<&Value> {
        self.secrets
            .get(key)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}
