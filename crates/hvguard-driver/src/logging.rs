//! Log output.
//!
//! All crates log through `tracing`. The sink is built here from a
//! [`LoggingConfig`] and either installed globally with [`init`] or scoped
//! with [`tracing::dispatcher::with_default`].

use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use crate::ConfigError;

/// The `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, in `RUST_LOG` syntax.
    pub level: String,

    /// Emit ANSI colors.
    pub ansi: bool,

    /// Include the module path of each event.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            ansi: false,
            target: true,
        }
    }
}

/// Builds a log sink writing to standard error.
pub fn dispatch(config: &LoggingConfig) -> Result<Dispatch, ConfigError> {
    let filter = EnvFilter::try_new(&config.level)?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.target)
        .with_writer(std::io::stderr)
        .finish();

    Ok(Dispatch::new(subscriber))
}

/// Installs the log sink globally.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    tracing::dispatcher::set_global_default(dispatch(config)?)?;
    Ok(())
}
