//! Hook policy handlers.
//!
//! A policy handler runs in place of a redirected kernel routine, on any
//! processor, in whatever context the routine was reached from. Handlers
//! never allocate and never block; everything they need lives in a
//! [`HookContext`] that is set up before the hook is installed.

mod access_guard;
mod enumeration_filter;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use hvguard_core::{GuardError, HookRequest, HookTarget, ProtectedProcessSet, TrampolineSlot, Va};

pub use self::{
    access_guard::AccessGuard,
    enumeration_filter::{EnumerationFilter, hide_protected},
};

/// State shared between a policy handler and the hook lifecycle manager.
#[derive(Debug)]
pub struct HookContext {
    protected: Arc<ProtectedProcessSet>,
    trampoline: Arc<TrampolineSlot>,
    first_detection: AtomicBool,
}

impl HookContext {
    /// Creates a context with an empty trampoline slot.
    pub fn new(protected: Arc<ProtectedProcessSet>) -> Self {
        Self {
            protected,
            trampoline: Arc::new(TrampolineSlot::new()),
            first_detection: AtomicBool::new(true),
        }
    }

    /// Returns the protected process set.
    pub fn protected(&self) -> &ProtectedProcessSet {
        &self.protected
    }

    /// Returns the trampoline slot the lifecycle manager publishes to.
    pub fn slot(&self) -> &Arc<TrampolineSlot> {
        &self.trampoline
    }

    /// Returns the published trampoline.
    pub fn trampoline(&self) -> Result<Va, GuardError> {
        self.trampoline.get().ok_or(GuardError::TrampolineNotReady)
    }

    /// Builds the install request for a handler of this context.
    pub fn request(&self, name: &'static str, target: HookTarget, replacement: Va) -> HookRequest {
        HookRequest {
            name,
            target,
            replacement,
            trampoline: self.trampoline.clone(),
        }
    }

    /// Returns `true` exactly once, on the first protected-process detection.
    pub fn first_detection(&self) -> bool {
        self.first_detection.swap(false, Ordering::Relaxed)
    }
}
