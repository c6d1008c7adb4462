//! The hvguard driver.
//!
//! Wires the hook engine, the Windows policies and the hypercall path into
//! a loadable unit:
//!
//! - [`GuardConfig`] describes what to protect and which optional phases
//!   to run.
//! - [`BootstrapSequencer`] brings the stack up and tears it down again.
//! - [`control`] implements the control device protocol.
//! - [`Guard`] owns all of the above.
//!
//! The kernel-facing pieces are reached through traits: [`EngineLifecycle`]
//! for the hook engine, [`DeviceHost`] for the I/O manager, [`Platform`] and
//! [`NtKernel`] for the rest of the kernel.
//!
//! [`EngineLifecycle`]: hvguard_core::EngineLifecycle
//! [`Platform`]: hvguard_core::Platform
//! [`NtKernel`]: hvguard_os_windows::NtKernel

mod bootstrap;
mod config;
pub mod control;
mod device;
mod guard;
mod hooks;
pub mod logging;

pub use self::{
    bootstrap::{BootstrapReport, BootstrapSequencer, BootstrapState, BootstrapStep, PhaseResult},
    config::{
        ConcealmentConfig, ConfigError, DemoHooksConfig, EngineConfig, GuardConfig,
        ProtectedConfig, ResolverConfig,
    },
    device::{DEVICE_NAME, DeviceHost, SYMBOLIC_LINK_NAME},
    guard::Guard,
    hooks::DemoHooks,
    logging::LoggingConfig,
};

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
