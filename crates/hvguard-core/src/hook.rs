use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{ProcessId, Va};

/// The published call-through address of one hook.
///
/// The engine redirects the target routine *before* it hands back the
/// trampoline, so a handler may run while the slot is still empty. An empty
/// slot reads as `None`; the handler must then fail the call instead of
/// calling through, because calling the original entry point would land
/// in the handler again.
///
/// Publication is a single-writer, multiple-reader transition: the writer
/// stores with `Release` and handlers on other processors load with
/// `Acquire`, so a handler never observes a half-initialized trampoline.
#[derive(Debug, Default)]
pub struct TrampolineSlot(AtomicU64);

impl TrampolineSlot {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Returns the trampoline, or `None` while the hook is pending.
    pub fn get(&self) -> Option<Va> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            address => Some(Va(address)),
        }
    }

    /// Checks whether a trampoline has been published.
    pub fn is_published(&self) -> bool {
        self.get().is_some()
    }

    /// Publishes the trampoline.
    pub fn publish(&self, trampoline: Va) {
        debug_assert!(!trampoline.is_null());
        self.0.store(trampoline.0, Ordering::Release);
    }

    /// Empties the slot.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// State of a hook record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookState {
    /// Installation was requested, the trampoline isn't published yet.
    Pending,

    /// The trampoline is published; handlers call through.
    Active,

    /// The engine rejected the install request.
    ///
    /// Failed records are never stored; this state only shows up in
    /// install reports.
    Failed,
}

impl std::fmt::Display for HookState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Where the routine to redirect lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTarget {
    /// A known address.
    Address(Va),

    /// An exported routine, resolved by name.
    Export(&'static str),

    /// The unexported routine called by an exported wrapper, resolved by
    /// inspecting the wrapper's machine code.
    CalledBy(&'static str),
}

/// A request to redirect one routine to a policy handler.
#[derive(Debug, Clone)]
pub struct HookRequest {
    /// Name of the hook, unique per manager.
    pub name: &'static str,

    /// The routine to redirect.
    pub target: HookTarget,

    /// Entry point of the replacement routine.
    pub replacement: Va,

    /// The slot the handler reads its trampoline from.
    pub trampoline: Arc<TrampolineSlot>,
}

/// An installed (or installing) hook.
#[derive(Debug)]
pub struct HookRecord {
    pub(crate) target: Va,
    pub(crate) replacement: Va,
    pub(crate) owner: ProcessId,
    pub(crate) trampoline: Arc<TrampolineSlot>,
}

impl HookRecord {
    /// Returns the redirected routine.
    pub fn target(&self) -> Va {
        self.target
    }

    /// Returns the replacement routine.
    pub fn replacement(&self) -> Va {
        self.replacement
    }

    /// Returns the owner process filter.
    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    /// Returns the trampoline, or `None` while pending.
    pub fn trampoline(&self) -> Option<Va> {
        self.trampoline.get()
    }

    /// Returns the state of the record.
    ///
    /// A stored record is `Pending` exactly while its trampoline is absent.
    pub fn state(&self) -> HookState {
        match self.trampoline.is_published() {
            true => HookState::Active,
            false => HookState::Pending,
        }
    }
}
