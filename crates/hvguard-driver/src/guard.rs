use std::sync::{Arc, PoisonError, RwLock};

use hvguard_core::{EngineLifecycle, GuardError, HookEngine, Platform};
use hvguard_os_windows::{InstallReport, NtKernel};
use hvguard_utils::hypercall::{Hypercall, HypercallPacket, HypercallResult};

use crate::{
    BootstrapReport, BootstrapSequencer, BootstrapState, DemoHooks, DeviceHost, GuardConfig,
    control::{self, ControlHandler, ControlRequest, IoCompletion, PingResponse},
};

/// The loaded driver.
///
/// Ties the bootstrap sequencer, the demonstration hooks, the control plane
/// and the hypercall path to one hook engine. The configuration, including
/// the protected process set, is fixed for the lifetime of the object.
pub struct Guard<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    config: GuardConfig,
    engine: Arc<Engine>,
    platform: Arc<dyn Platform>,
    hooks: Arc<DemoHooks<Engine, Kernel>>,
    sequencer: BootstrapSequencer<Engine, Device, Kernel>,
    hypercall: Hypercall<Engine>,

    /// Set once unload begins. Install and unhook requests hold the read
    /// side for their whole duration; unload takes the write side.
    unloading: RwLock<bool>,
}

impl<Engine, Device, Kernel> Guard<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Engine::Architecture: 'static,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    /// Creates the driver without starting anything.
    pub fn new(
        config: GuardConfig,
        engine: Arc<Engine>,
        device: Arc<Device>,
        platform: Arc<dyn Platform>,
        kernel: Arc<Kernel>,
    ) -> Self {
        let hooks = Arc::new(DemoHooks::new(
            engine.clone(),
            platform.clone(),
            kernel,
            config.protected.to_set(),
            config.resolver.window,
        ));

        Self {
            sequencer: BootstrapSequencer::new(engine.clone(), device, hooks.clone()),
            hypercall: Hypercall::new(engine.clone()),
            config,
            engine,
            platform,
            hooks,
            unloading: RwLock::new(false),
        }
    }

    /// Creates the driver and runs the bootstrap.
    pub fn load(
        config: GuardConfig,
        engine: Arc<Engine>,
        device: Arc<Device>,
        platform: Arc<dyn Platform>,
        kernel: Arc<Kernel>,
    ) -> Result<(Self, BootstrapReport), GuardError> {
        let guard = Self::new(config, engine, device, platform, kernel);
        let report = guard.bootstrap()?;
        Ok((guard, report))
    }
}

impl<Engine, Device, Kernel> Guard<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    /// Returns the configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Returns the hook engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the demonstration hooks.
    pub fn hooks(&self) -> &DemoHooks<Engine, Kernel> {
        &self.hooks
    }

    /// Returns the bootstrap sequencer.
    pub fn sequencer(&self) -> &BootstrapSequencer<Engine, Device, Kernel> {
        &self.sequencer
    }

    /// Returns the bootstrap state.
    pub fn state(&self) -> BootstrapState {
        self.sequencer.state()
    }

    /// Runs the bootstrap.
    ///
    /// Fails if a mandatory step failed; the stack is unwound by then.
    pub fn bootstrap(&self) -> Result<BootstrapReport, GuardError> {
        self.sequencer.run(&self.config).into_result()
    }

    /// Handles a request on the control device.
    pub fn handle(&self, request: ControlRequest<'_>) -> IoCompletion {
        control::dispatch(self, request)
    }

    /// Handles a hypercall.
    pub fn hypercall(&self, packet: HypercallPacket) -> HypercallResult {
        self.hypercall.dispatch(packet)
    }

    /// Tears the driver down.
    ///
    /// Waits for in-flight install and unhook requests; later ones are
    /// refused. Safe to call more than once.
    pub fn unload(&self) {
        let mut unloading = self.unloading.write().unwrap_or_else(PoisonError::into_inner);
        if !*unloading {
            tracing::info!("unloading");
        }

        *unloading = true;
        self.sequencer.teardown();
    }
}

impl<Engine, Device, Kernel> ControlHandler for Guard<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    fn ping(&self) -> PingResponse {
        let response = PingResponse::new(
            HypercallResult::SIGNATURE.0,
            self.platform.active_processor_count(),
            HookEngine::is_running(&*self.engine),
        );

        tracing::debug!(
            processor_count = response.processor_count,
            is_running = response.is_running(),
            "ping"
        );

        response
    }

    fn install_demo_hooks(&self) -> Result<InstallReport, GuardError> {
        let unloading = self.unloading.read().unwrap_or_else(PoisonError::into_inner);
        if *unloading {
            return Err(GuardError::Unloading);
        }

        self.sequencer.install_hooks()
    }

    fn unhook_all(&self) -> Result<(), GuardError> {
        let unloading = self.unloading.read().unwrap_or_else(PoisonError::into_inner);
        if *unloading {
            return Err(GuardError::Unloading);
        }

        self.sequencer.remove_hooks()
    }
}
