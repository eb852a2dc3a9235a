//! Domus automation server
//!
//! Main entry point: loads the configuration, starts the bus, scheduler and
//! rules, and runs until a termination signal arrives.

mod domus;
mod logging;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use domus_config::DomusConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domus::Domus;
use crate::logging::Logging;

/// Domus - event-driven home automation core
#[derive(Parser, Debug)]
#[command(name = "domus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "domus.yaml")]
    config: PathBuf,

    /// Log filter, overriding DOMUS_LOG and logging.level
    #[arg(long)]
    log_level: Option<String>,
}

// Synchronous: the scheduler owns the runtimes and must shut them down from
// outside any of them.
fn main() -> Result<()> {
    let args = Args::parse();
    let logging = Logging::init(args.log_level.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Domus");
    let config = load_config(&args.config)?;
    logging.apply_level(&config.logging.level)?;

    let domus = Domus::start(config)?;
    domus.wait_for_shutdown()?;
    domus.stop();
    Ok(())
}

/// Load the configuration, falling back to defaults when the file is missing
fn load_config(path: &Path) -> Result<DomusConfig> {
    if !path.exists() {
        warn!(?path, "Configuration file not found, using defaults");
        return Ok(DomusConfig::default());
    }
    DomusConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["domus"]);
        assert_eq!(args.config, PathBuf::from("domus.yaml"));
        assert!(args.log_level.is_none());

        let args = Args::parse_from(["domus", "-c", "/etc/domus.yaml", "--log-level", "debug"]);
        assert_eq!(args.config, PathBuf::from("/etc/domus.yaml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, DomusConfig::default());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domus.yaml");
        std::fs::write(&path, "tasks:\n  max_threads: 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("failed to load configuration"));
    }
}
