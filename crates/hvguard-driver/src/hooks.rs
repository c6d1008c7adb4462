use std::sync::Arc;

use hvguard_core::{CallScanResolver, HookEngine, HookManager, Platform, ProtectedProcessSet};
use hvguard_os_windows::{DemoPolicies, InstallReport, NtKernel};

/// The demonstration policies bound to a hook manager.
pub struct DemoHooks<Engine, Kernel>
where
    Engine: HookEngine,
    Kernel: NtKernel,
{
    manager: HookManager<Engine>,
    policies: DemoPolicies<Kernel>,
    platform: Arc<dyn Platform>,
}

impl<Engine, Kernel> DemoHooks<Engine, Kernel>
where
    Engine: HookEngine,
    Engine::Architecture: 'static,
    Kernel: NtKernel,
{
    /// Creates the policies and a manager resolving targets within
    /// `window` bytes.
    pub fn new(
        engine: Arc<Engine>,
        platform: Arc<dyn Platform>,
        kernel: Arc<Kernel>,
        protected: ProtectedProcessSet,
        window: usize,
    ) -> Self {
        let resolver = CallScanResolver::<Engine::Architecture>::new(window);

        Self {
            manager: HookManager::with_resolver(engine, Box::new(resolver)),
            policies: DemoPolicies::new(kernel, Arc::new(protected)),
            platform,
        }
    }
}

impl<Engine, Kernel> DemoHooks<Engine, Kernel>
where
    Engine: HookEngine,
    Kernel: NtKernel,
{
    /// Returns the hook manager.
    pub fn manager(&self) -> &HookManager<Engine> {
        &self.manager
    }

    /// Returns the policies.
    pub fn policies(&self) -> &DemoPolicies<Kernel> {
        &self.policies
    }

    /// Installs both policies.
    pub fn install(&self) -> InstallReport {
        self.policies.install(&self.manager, &*self.platform)
    }

    /// Removes every hook.
    pub fn unhook_all(&self) {
        self.manager.unhook_all();
    }
}
