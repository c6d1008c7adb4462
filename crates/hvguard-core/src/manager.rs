use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::{
    Architecture as _, CallScanResolver, GuardError, HookEngine, HookRecord, HookRequest,
    HookState, HookTarget, Platform, TargetResolver, Va,
};

/// Result of a successful install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The engine redirected the target and published this trampoline.
    Activated(Va),

    /// The hook was already active; the engine was not contacted.
    AlreadyActive(Va),
}

impl InstallOutcome {
    /// Returns the trampoline of the hook.
    pub fn trampoline(&self) -> Va {
        match self {
            Self::Activated(trampoline) | Self::AlreadyActive(trampoline) => *trampoline,
        }
    }
}

/// Coordinates hook installation and teardown against the hook engine.
///
/// The manager owns every [`HookRecord`]. A record is created in the
/// `Pending` state right before the engine is asked to redirect the target,
/// becomes `Active` once the trampoline is published, and is dropped by
/// [`unhook_all`]. There is no per-hook removal.
///
/// The registry stays locked for the whole install, so `Pending` records
/// are only ever observed by the engine itself.
///
/// [`unhook_all`]: Self::unhook_all
pub struct HookManager<Engine>
where
    Engine: HookEngine,
{
    engine: Arc<Engine>,
    resolver: Box<dyn TargetResolver>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    records: IndexMap<&'static str, HookRecord>,

    /// Targets the engine redirected without handing back a usable
    /// trampoline. The redirection lives until the next global unhook.
    stale: IndexMap<&'static str, Va>,
}

impl<Engine> HookManager<Engine>
where
    Engine: HookEngine,
    Engine::Architecture: 'static,
{
    /// Creates a manager resolving targets with the default call scanner.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_resolver(
            engine,
            Box::new(CallScanResolver::<Engine::Architecture>::default()),
        )
    }
}

impl<Engine> HookManager<Engine>
where
    Engine: HookEngine,
{
    /// Creates a manager with a custom target resolver.
    pub fn with_resolver(engine: Arc<Engine>, resolver: Box<dyn TargetResolver>) -> Self {
        Self {
            engine,
            resolver,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Returns the hook engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves a hook target to an address.
    pub fn resolve(&self, platform: &dyn Platform, target: HookTarget) -> Result<Va, GuardError> {
        match target {
            HookTarget::Address(address) => Ok(address),
            HookTarget::Export(name) => platform
                .routine_address(name)
                .ok_or(GuardError::ExportNotFound(name)),
            HookTarget::CalledBy(name) => {
                let wrapper = platform
                    .routine_address(name)
                    .ok_or(GuardError::ExportNotFound(name))?;

                self.resolver.resolve(platform, wrapper)
            }
        }
    }

    /// Installs a hook.
    ///
    /// The record is registered as `Pending` before the engine is called;
    /// the trampoline is published only after the engine returned a valid
    /// one. If the engine fails, the record is dropped again.
    ///
    /// A hook that is already `Active` under the same name is reported as
    /// [`InstallOutcome::AlreadyActive`] without contacting the engine.
    ///
    /// If the engine returned an unusable trampoline, its redirection stays
    /// in place until [`unhook_all`]. Until then, installing the same hook
    /// again fails with [`GuardError::HookInstallFailed`] without
    /// contacting the engine.
    ///
    /// [`unhook_all`]: Self::unhook_all
    pub fn install(
        &self,
        platform: &dyn Platform,
        request: HookRequest,
    ) -> Result<InstallOutcome, GuardError> {
        let mut registry = self.registry();

        if let Some(trampoline) = registry
            .records
            .get(request.name)
            .and_then(HookRecord::trampoline)
        {
            tracing::debug!(name = request.name, %trampoline, "hook already active");
            return Ok(InstallOutcome::AlreadyActive(trampoline));
        }

        if let Some(&target) = registry.stale.get(request.name) {
            tracing::warn!(name = request.name, %target, "redirection without trampoline");
            return Err(GuardError::HookInstallFailed { target });
        }

        let target = self.resolve(platform, request.target)?;
        let hint = platform.current_processor();
        let owner = platform.current_process_id();

        tracing::info!(
            name = request.name,
            %target,
            replacement = %request.replacement,
            %hint,
            %owner,
            "installing hook"
        );

        request.trampoline.reset();
        registry.records.insert(
            request.name,
            HookRecord {
                target,
                replacement: request.replacement,
                owner,
                trampoline: request.trampoline.clone(),
            },
        );

        let result = self
            .engine
            .install_hook(hint, target, request.replacement, owner)
            .and_then(|trampoline| {
                if trampoline.is_null() || !Engine::Architecture::is_kernel_address(trampoline) {
                    return Err(GuardError::InvalidTrampoline(trampoline));
                }

                Ok(trampoline)
            });

        match result {
            Ok(trampoline) => {
                request.trampoline.publish(trampoline);
                tracing::info!(name = request.name, %trampoline, "hook active");
                Ok(InstallOutcome::Activated(trampoline))
            }
            Err(err) => {
                registry.records.shift_remove(request.name);
                tracing::error!(
                    name = request.name,
                    %target,
                    state = %HookState::Failed,
                    %err,
                    "hook installation failed"
                );

                match err {
                    GuardError::InvalidTrampoline(_) => {
                        registry.stale.insert(request.name, target);
                        Err(err)
                    }
                    _ => Err(GuardError::HookInstallFailed { target }),
                }
            }
        }
    }

    /// Removes every hook.
    ///
    /// The engine invalidates all redirections first; afterwards every
    /// trampoline slot is emptied and every record dropped, so a late
    /// handler invocation fails benignly instead of calling a stale
    /// trampoline.
    pub fn unhook_all(&self) {
        let mut registry = self.registry();

        self.engine.unhook_all();

        for (name, record) in registry.records.drain(..) {
            record.trampoline.reset();
            tracing::debug!(name, address = %record.target, "hook removed");
        }

        registry.stale.clear();

        tracing::info!("all hooks removed");
    }

    /// Returns the state of the named hook, or `None` if absent.
    pub fn state(&self, name: &str) -> Option<HookState> {
        self.registry().records.get(name).map(HookRecord::state)
    }

    /// Returns the number of active hooks.
    pub fn active_count(&self) -> usize {
        self.registry()
            .records
            .values()
            .filter(|record| record.state() == HookState::Active)
            .count()
    }

    /// Returns the number of hook records.
    pub fn len(&self) -> usize {
        self.registry().records.len()
    }

    /// Checks whether no hook record exists.
    pub fn is_empty(&self) -> bool {
        self.registry().records.is_empty()
    }

    /// Checks whether the engine may hold a redirection installed through
    /// this manager, with or without a usable trampoline.
    pub fn has_redirections(&self) -> bool {
        let registry = self.registry();
        !registry.records.is_empty() || !registry.stale.is_empty()
    }

    /// Returns the target and state of every record, in install order.
    pub fn snapshot(&self) -> Vec<(&'static str, Va, HookState)> {
        self.registry()
            .records
            .iter()
            .map(|(name, record)| (*name, record.target, record.state()))
            .collect()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
