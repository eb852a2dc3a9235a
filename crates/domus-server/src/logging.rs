//! Log output setup

use anyhow::{Context, Result};
use tracing_subscriber::{reload, EnvFilter, FmtSubscriber};

/// Environment variable overriding the configured log level
pub const LOG_ENV: &str = "DOMUS_LOG";

const DEFAULT_LEVEL: &str = "info";

type Reload = Box<dyn Fn(EnvFilter) -> Result<(), reload::Error>>;

/// Installed log subscriber
pub struct Logging {
    /// Present unless the command line or environment fixed the filter
    reload: Option<Reload>,
}

impl Logging {
    /// Install the global subscriber
    ///
    /// The filter comes from `--log-level`, then `DOMUS_LOG`, then `info`
    /// until the configuration is loaded.
    pub fn init(cli_level: Option<&str>) -> Result<Self> {
        let (filter, fixed) = match cli_level {
            Some(level) => (
                EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?,
                true,
            ),
            None => match EnvFilter::try_from_env(LOG_ENV) {
                Ok(filter) => (filter, true),
                Err(_) => (EnvFilter::new(DEFAULT_LEVEL), false),
            },
        };

        let builder = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_filter_reloading();
        let handle = builder.reload_handle();
        tracing::subscriber::set_global_default(builder.finish())
            .context("failed to install log subscriber")?;

        let reload: Option<Reload> = if fixed {
            None
        } else {
            Some(Box::new(move |filter: EnvFilter| handle.reload(filter)))
        };
        Ok(Self { reload })
    }

    /// Switch to the configured level unless overridden
    pub fn apply_level(&self, level: &str) -> Result<()> {
        let Some(reload) = &self.reload else {
            return Ok(());
        };
        let filter = EnvFilter::try_new(level)
            .with_context(|| format!("invalid logging.level '{level}'"))?;
        reload(filter).context("failed to apply logging.level")
    }
}
