//! Driver configuration.
//!
//! Every section has defaults, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! [protected]
//! names = ["cheatengine", "HyperCE", "x64dbg", "x32dbg", "ida"]
//!
//! [engine]
//! preallocated_hooks = 5
//! preallocated_monitor_hooks = 5
//!
//! [concealment]
//! enabled = true
//! hide = true
//! by_process_id = true
//! process_id = 0
//!
//! [demo_hooks]
//! install_at_load = true
//!
//! [resolver]
//! window = 256
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use hvguard_core::{
    ConcealmentRequest, PoolReservation, ProcessId, ProtectedProcessSet, SyscallNumbers,
};
use serde::{Deserialize, Serialize};

use crate::LoggingConfig;

/// An error raised while loading the configuration or setting up logging.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`GuardConfig`].
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// The log filter directive is invalid.
    #[error(transparent)]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global logger is already installed.
    #[error(transparent)]
    Logging(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

/// Driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// The protected process set.
    pub protected: ProtectedConfig,

    /// Hook engine resources.
    pub engine: EngineConfig,

    /// Concealment mode.
    pub concealment: ConcealmentConfig,

    /// Demonstration hooks.
    pub demo_hooks: DemoHooksConfig,

    /// Target resolution.
    pub resolver: ResolverConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

impl GuardConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(?path, "reading configuration");

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;

        tracing::info!(?path, "configuration loaded");
        Ok(config)
    }
}

/// The `[protected]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedConfig {
    /// Name substrings identifying protected processes.
    pub names: Vec<String>,
}

impl ProtectedConfig {
    /// Builds the protected process set.
    pub fn to_set(&self) -> ProtectedProcessSet {
        ProtectedProcessSet::new(&self.names)
    }
}

impl Default for ProtectedConfig {
    fn default() -> Self {
        Self {
            names: ["cheatengine", "HyperCE", "x64dbg", "x32dbg", "ida"]
                .map(String::from)
                .into(),
        }
    }
}

/// The `[engine]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of execution hooks to reserve memory for.
    pub preallocated_hooks: u32,

    /// Number of monitor hooks to reserve memory for.
    pub preallocated_monitor_hooks: u32,
}

impl EngineConfig {
    /// Returns the pool reservation request.
    pub fn pool_reservation(&self) -> PoolReservation {
        PoolReservation {
            hooks: self.preallocated_hooks,
            monitor_hooks: self.preallocated_monitor_hooks,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let reservation = PoolReservation::default();

        Self {
            preallocated_hooks: reservation.hooks,
            preallocated_monitor_hooks: reservation.monitor_hooks,
        }
    }
}

/// The `[concealment]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcealmentConfig {
    /// Whether to activate concealment mode at load.
    pub enabled: bool,

    /// Hide the engine from introspection.
    pub hide: bool,

    /// Select the process to hide from by id.
    pub by_process_id: bool,

    /// The process id, when `by_process_id` is set.
    pub process_id: u32,

    /// System-call numbers of the intercepted routines.
    pub syscalls: SyscallNumbers,
}

impl ConcealmentConfig {
    /// Returns the concealment request.
    pub fn request(&self) -> ConcealmentRequest {
        ConcealmentRequest {
            hide: self.hide,
            by_process_id: self.by_process_id,
            process_id: ProcessId(self.process_id),
            syscalls: self.syscalls,
        }
    }
}

impl Default for ConcealmentConfig {
    fn default() -> Self {
        let request = ConcealmentRequest::default();

        Self {
            enabled: true,
            hide: request.hide,
            by_process_id: request.by_process_id,
            process_id: request.process_id.0,
            syscalls: request.syscalls,
        }
    }
}

/// The `[demo_hooks]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoHooksConfig {
    /// Whether to install the demonstration hooks at load.
    pub install_at_load: bool,
}

impl Default for DemoHooksConfig {
    fn default() -> Self {
        Self {
            install_at_load: true,
        }
    }
}

/// The `[resolver]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Number of bytes scanned for the near call.
    pub window: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { window: 0x100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> Result<(), ConfigError> {
        let config = GuardConfig::from_toml_str("")?;
        assert_eq!(config, GuardConfig::default());

        assert_eq!(config.protected.to_set().len(), 5);
        assert_eq!(config.engine.pool_reservation(), PoolReservation::default());
        assert_eq!(config.concealment.request(), ConcealmentRequest::default());
        assert!(config.concealment.enabled);
        assert!(config.demo_hooks.install_at_load);
        assert_eq!(config.resolver.window, 0x100);
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn partial_sections() -> Result<(), ConfigError> {
        let config = GuardConfig::from_toml_str(
            r#"
            [protected]
            names = ["ollydbg", "ReClass"]

            [engine]
            preallocated_hooks = 10

            [concealment]
            enabled = false

            [concealment.syscalls]
            nt_query_system_information = 0x37

            [demo_hooks]
            install_at_load = false

            [logging]
            level = "hvguard=debug"
            "#,
        )?;

        let set = config.protected.to_set();
        assert_eq!(set.patterns().collect::<Vec<_>>(), ["ollydbg", "ReClass"]);

        assert_eq!(
            config.engine.pool_reservation(),
            PoolReservation {
                hooks: 10,
                monitor_hooks: 5
            }
        );

        assert!(!config.concealment.enabled);
        assert_eq!(config.concealment.syscalls.nt_query_system_information, 0x37);
        assert_eq!(config.concealment.syscalls.nt_open_key, 0x12);
        assert!(!config.demo_hooks.install_at_load);
        assert_eq!(config.logging.level, "hvguard=debug");
        Ok(())
    }

    #[test]
    fn invalid_document_is_an_error() {
        let result = GuardConfig::from_toml_str("[engine]\npreallocated_hooks = \"many\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = GuardConfig::load("/nonexistent/hvguard.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
