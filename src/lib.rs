//! Process guarding on top of a hypervisor hook engine.
//!
//! `hvguard` redirects two kernel routines through an EPT hook engine:
//! handle references from a protected process to its targets are stripped
//! of access checks, and protected processes are removed from process
//! enumeration results. A control device lets user mode query the engine
//! and install or remove the hooks at runtime.
//!
//! The crate is split along the same lines as the hook engine itself:
//!
//! - [`hvguard_core`] (re-exported at the root): addresses, the hook engine
//!   seam, target resolution and the hook lifecycle manager.
//! - [`arch`]: instruction decoding for supported architectures.
//! - [`os`]: the operating-system specific policies.
//! - [`driver`]: bootstrap, teardown and the control plane.
//! - [`utils`]: the hypercall interface.

pub use hvguard_core::*;

/// Architecture-specific code.
pub mod arch {
    #[cfg(feature = "arch-amd64")]
    pub use hvguard_arch_amd64 as amd64;
}

/// Operating-system specific policies.
pub mod os {
    #[cfg(feature = "os-windows")]
    pub use hvguard_os_windows as windows;
}

/// The driver.
#[cfg(feature = "driver")]
pub use hvguard_driver as driver;

/// Utilities.
#[cfg(feature = "utils")]
pub use hvguard_utils as utils;
