use serde::{Deserialize, Serialize};

use crate::{Architecture, GuardError, ProcessId, ProcessorNumber, Va};

/// The narrow interface of the external hook engine.
///
/// The engine performs the actual execution redirection (for example with
/// EPT shadow pages). Once [`install_hook`] returns, every execution of
/// `target` anywhere in the system lands in `replacement`; the returned
/// trampoline performs the original behavior of `target`.
///
/// [`install_hook`]: Self::install_hook
pub trait HookEngine: Send + Sync {
    /// The architecture the engine redirects code on.
    type Architecture: Architecture + ?Sized;

    /// Redirects `target` to `replacement` and returns the trampoline.
    fn install_hook(
        &self,
        hint: ProcessorNumber,
        target: Va,
        replacement: Va,
        owner: ProcessId,
    ) -> Result<Va, GuardError>;

    /// Invalidates every installed hook in one global operation.
    fn unhook_all(&self);

    /// Checks whether the engine is up and running.
    fn is_running(&self) -> bool;
}

/// Load-time control of the hook engine.
///
/// Only the bootstrap sequencer drives these; every step that succeeds is
/// recorded so that its counterpart runs exactly once on teardown.
pub trait EngineLifecycle: HookEngine {
    /// Starts the engine. Failure is fatal for the whole subsystem.
    fn initialize(&self) -> Result<(), GuardError>;

    /// Initializes the cross-processor broadcast (NMI) plumbing.
    fn initialize_broadcast(&self) -> Result<(), GuardError>;

    /// Pre-reserves the memory pools later hook installs draw from.
    fn reserve_pools(&self, reservation: PoolReservation) -> Result<(), GuardError>;

    /// Releases the pools reserved by [`reserve_pools`].
    ///
    /// [`reserve_pools`]: Self::reserve_pools
    fn release_pools(&self) {}

    /// Activates the anti-introspection mode.
    fn enable_concealment(&self, request: &ConcealmentRequest) -> Result<(), GuardError>;

    /// Deactivates the anti-introspection mode.
    fn disable_concealment(&self) {}

    /// Stops the engine.
    fn shutdown(&self);
}

/// Number of hooks the engine should reserve memory for up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolReservation {
    /// Execution hooks.
    pub hooks: u32,

    /// Memory-monitor and execution hooks needing extra hooking pages.
    pub monitor_hooks: u32,
}

impl Default for PoolReservation {
    fn default() -> Self {
        Self {
            hooks: 5,
            monitor_hooks: 5,
        }
    }
}

/// Request that switches the engine into concealment mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcealmentRequest {
    /// Hide the engine from introspection.
    pub hide: bool,

    /// Identify the process to hide from by id rather than by name.
    pub by_process_id: bool,

    /// The process id, when `by_process_id` is set.
    pub process_id: ProcessId,

    /// System-call numbers of the routines the engine intercepts.
    pub syscalls: SyscallNumbers,
}

impl Default for ConcealmentRequest {
    fn default() -> Self {
        Self {
            hide: true,
            by_process_id: true,
            process_id: ProcessId(0),
            syscalls: SyscallNumbers::default(),
        }
    }
}

/// System-call numbers of the debugger-detection surface.
///
/// The defaults match one specific Windows build. They are not discovered
/// at runtime; a different build needs a different table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct SyscallNumbers {
    pub nt_query_system_information: u32,
    pub nt_query_system_information_ex: u32,
    pub nt_system_debug_control: u32,
    pub nt_query_attributes_file: u32,
    pub nt_open_directory_object: u32,
    pub nt_query_directory_object: u32,
    pub nt_query_information_process: u32,
    pub nt_set_information_process: u32,
    pub nt_query_information_thread: u32,
    pub nt_set_information_thread: u32,
    pub nt_open_file: u32,
    pub nt_open_key: u32,
    pub nt_open_key_ex: u32,
    pub nt_query_value_key: u32,
    pub nt_enumerate_key: u32,
}

impl Default for SyscallNumbers {
    fn default() -> Self {
        Self {
            nt_query_system_information: 0x36,
            nt_query_system_information_ex: 0xF1,
            nt_system_debug_control: 0x1D9,
            nt_query_attributes_file: 0x40,
            nt_open_directory_object: 0x58,
            nt_query_directory_object: 0x5B,
            nt_query_information_process: 0x19,
            nt_set_information_process: 0x1C,
            nt_query_information_thread: 0x25,
            nt_set_information_thread: 0x0D,
            nt_open_file: 0x33,
            nt_open_key: 0x12,
            nt_open_key_ex: 0xCF,
            nt_query_value_key: 0x17,
            nt_enumerate_key: 0x32,
        }
    }
}
