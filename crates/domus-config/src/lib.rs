//! YAML configuration loading for Domus
//!
//! Configuration files may use these custom tags:
//!
//! - `!include path` - Include another YAML file, relative to the including one
//! - `!secret key` - Substitute from `secrets.yaml` beside the main file
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use domus_config::DomusConfig;
//!
//! let config = DomusConfig::load("/etc/domus/domus.yaml")?;
//! println!("{} rules configured", config.rules.len());
//! ```

mod config;
mod error;
mod loader;
mod secrets;

pub use config::{ActionConfig, DomusConfig, LoggingConfig, PostConfig, RuleConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
