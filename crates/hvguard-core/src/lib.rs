//! Core hvguard functionality.
//!
//! This crate holds everything that doesn't depend on a particular
//! operating system or instruction set: the address types, the narrow
//! interface of the external hook engine, the services consumed from the
//! operating system, the target resolver, the protected process set and the
//! hook lifecycle manager.

pub mod arch;
mod core;
mod engine;
mod error;
mod hook;
mod manager;
mod platform;
mod protected;
pub mod resolver;

pub use self::{
    arch::Architecture,
    core::{ProcessId, ProcessorNumber, Va},
    engine::{ConcealmentRequest, EngineLifecycle, HookEngine, PoolReservation, SyscallNumbers},
    error::GuardError,
    hook::{HookRecord, HookRequest, HookState, HookTarget, TrampolineSlot},
    manager::{HookManager, InstallOutcome},
    platform::{MemoryReader, Platform},
    protected::ProtectedProcessSet,
    resolver::{CallScanResolver, TargetResolver},
};
