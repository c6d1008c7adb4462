//! Load-time bootstrap and teardown.
//!
//! The sequencer brings the stack up in a fixed order:
//!
//! 1. Create the control device and its symbolic link.
//! 2. Initialize the hook engine. Fatal on failure.
//! 3. Initialize the broadcast plumbing and reserve the hook pools.
//!    Degraded on failure.
//! 4. Activate concealment mode, if configured and the pools are ready.
//!    Degraded on failure.
//! 5. Install the demonstration hooks, if configured. Degraded on failure.
//!
//! Every completed step is pushed onto a ledger. Teardown pops the ledger,
//! so it undoes exactly the steps that completed, in reverse order.
//!
//! Runtime install and unhook requests go through the sequencer as well.
//! They hold the ledger while they touch the engine, and are refused until
//! the engine step is on it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hvguard_core::{EngineLifecycle, GuardError};
use hvguard_os_windows::{InstallReport, NtKernel};
use smallvec::SmallVec;

use crate::{
    DemoHooks, DeviceHost, GuardConfig,
    device::{DEVICE_NAME, SYMBOLIC_LINK_NAME},
};

/// A bootstrap step with a teardown counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    /// The control device exists.
    CreateDevice,

    /// The symbolic link to the control device exists.
    CreateSymbolicLink,

    /// The hook engine is running.
    InitializeEngine,

    /// The hook pools are reserved.
    ReservePools,

    /// Concealment mode is active.
    EnableConcealment,

    /// The demonstration hooks are (at least partially) installed.
    InstallDemoHooks,
}

impl std::fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::CreateDevice => write!(f, "create device"),
            Self::CreateSymbolicLink => write!(f, "create symbolic link"),
            Self::InitializeEngine => write!(f, "initialize engine"),
            Self::ReservePools => write!(f, "reserve pools"),
            Self::EnableConcealment => write!(f, "enable concealment"),
            Self::InstallDemoHooks => write!(f, "install demonstration hooks"),
        }
    }
}

/// The outcome of one bootstrap phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    /// The phase completed.
    Ok,

    /// The phase failed; the stack keeps running with reduced capability.
    Degraded(String),

    /// The phase failed; the stack was unwound.
    Fatal(String),
}

impl PhaseResult {
    /// Checks whether the phase completed.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// The state of the bootstrap state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapState {
    /// Nothing is running.
    Uninitialized,

    /// The engine is running; pools were not attempted yet.
    EngineReady,

    /// The engine is running without reserved pools.
    Degraded,

    /// The engine is running with reserved pools.
    PoolsReady,

    /// Concealment mode is active.
    ConcealmentConfigured,

    /// The demonstration hooks are installed.
    DemoHooksInstalled,
}

/// The result of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// The state the run ended in.
    pub state: BootstrapState,

    /// The phases that ran, in order.
    pub phases: Vec<(BootstrapStep, PhaseResult)>,
}

impl BootstrapReport {
    /// Returns the result of `step`, or `None` if it didn't run.
    pub fn phase(&self, step: BootstrapStep) -> Option<&PhaseResult> {
        self.phases
            .iter()
            .find(|(phase, _)| *phase == step)
            .map(|(_, result)| result)
    }

    /// Checks whether any phase degraded.
    pub fn is_degraded(&self) -> bool {
        self.phases
            .iter()
            .any(|(_, result)| matches!(result, PhaseResult::Degraded(_)))
    }

    /// Returns the phase that aborted the run, if any.
    pub fn fatal(&self) -> Option<(BootstrapStep, &str)> {
        self.phases.iter().find_map(|(step, result)| match result {
            PhaseResult::Fatal(reason) => Some((*step, reason.as_str())),
            _ => None,
        })
    }

    /// Converts an aborted run into an error.
    ///
    /// An engine failure becomes [`GuardError::EngineInitFailed`]; a device
    /// failure is passed on as [`GuardError::Os`].
    pub fn into_result(self) -> Result<Self, GuardError> {
        match self.fatal() {
            None => Ok(self),
            Some((BootstrapStep::InitializeEngine, reason)) => {
                Err(GuardError::EngineInitFailed(reason.to_owned()))
            }
            Some((_, reason)) => Err(GuardError::Os(reason.into())),
        }
    }
}

/// Brings the stack up and down.
pub struct BootstrapSequencer<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    engine: Arc<Engine>,
    device: Arc<Device>,
    hooks: Arc<DemoHooks<Engine, Kernel>>,
    ledger: Mutex<SmallVec<[BootstrapStep; 6]>>,
    state: Mutex<BootstrapState>,
}

impl<Engine, Device, Kernel> BootstrapSequencer<Engine, Device, Kernel>
where
    Engine: EngineLifecycle,
    Device: DeviceHost,
    Kernel: NtKernel,
{
    /// Creates a new sequencer.
    pub fn new(
        engine: Arc<Engine>,
        device: Arc<Device>,
        hooks: Arc<DemoHooks<Engine, Kernel>>,
    ) -> Self {
        Self {
            engine,
            device,
            hooks,
            ledger: Mutex::new(SmallVec::new()),
            state: Mutex::new(BootstrapState::Uninitialized),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, SmallVec<[BootstrapStep; 6]>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: BootstrapState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Returns the current state.
    pub fn state(&self) -> BootstrapState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the completed steps, in completion order.
    pub fn completed(&self) -> Vec<BootstrapStep> {
        self.ledger().to_vec()
    }

    fn complete(&self, step: BootstrapStep) {
        tracing::debug!(%step, "step completed");
        self.ledger().push(step);
    }

    /// Runs the bootstrap.
    ///
    /// A failure to create the device, the symbolic link or to initialize
    /// the engine unwinds the completed steps and ends the run with a fatal
    /// phase. Every later failure is reported as a degraded phase.
    pub fn run(&self, config: &GuardConfig) -> BootstrapReport {
        let mut phases = Vec::new();

        tracing::info!("bootstrapping");

        //
        // Device and engine, mandatory.
        //

        if let Err(err) = self.device.create_device(DEVICE_NAME) {
            tracing::error!(%err, name = DEVICE_NAME, "failed to create device");
            return self.abort(phases, BootstrapStep::CreateDevice, err);
        }
        self.complete(BootstrapStep::CreateDevice);
        phases.push((BootstrapStep::CreateDevice, PhaseResult::Ok));

        if let Err(err) = self
            .device
            .create_symbolic_link(SYMBOLIC_LINK_NAME, DEVICE_NAME)
        {
            tracing::error!(%err, name = SYMBOLIC_LINK_NAME, "failed to create symbolic link");
            return self.abort(phases, BootstrapStep::CreateSymbolicLink, err);
        }
        self.complete(BootstrapStep::CreateSymbolicLink);
        phases.push((BootstrapStep::CreateSymbolicLink, PhaseResult::Ok));

        if let Err(err) = self.engine.initialize() {
            tracing::error!(%err, "engine initialization failed");
            return self.abort(phases, BootstrapStep::InitializeEngine, err);
        }
        self.complete(BootstrapStep::InitializeEngine);
        self.set_state(BootstrapState::EngineReady);
        phases.push((BootstrapStep::InitializeEngine, PhaseResult::Ok));

        //
        // Pools, soft.
        //

        let pools = self.reserve_pools(config);
        let pools_ready = pools.is_ok();
        phases.push((BootstrapStep::ReservePools, pools));

        //
        // Concealment, optional.
        //

        if config.concealment.enabled {
            let concealment = match pools_ready {
                true => self.enable_concealment(config),
                false => {
                    tracing::warn!("concealment disabled, hook pools are unavailable");
                    PhaseResult::Degraded(String::from("hook pools are unavailable"))
                }
            };

            phases.push((BootstrapStep::EnableConcealment, concealment));
        }

        //
        // Demonstration hooks, optional.
        //

        if config.demo_hooks.install_at_load {
            phases.push((BootstrapStep::InstallDemoHooks, self.install_demo_hooks()));
        }

        let report = BootstrapReport {
            state: self.state(),
            phases,
        };

        match report.is_degraded() {
            true => tracing::warn!(state = ?report.state, "bootstrap completed degraded"),
            false => tracing::info!(state = ?report.state, "bootstrap completed"),
        }

        report
    }

    /// Unwinds the completed steps and ends the run at `step`.
    fn abort(
        &self,
        mut phases: Vec<(BootstrapStep, PhaseResult)>,
        step: BootstrapStep,
        err: GuardError,
    ) -> BootstrapReport {
        self.teardown();
        phases.push((step, PhaseResult::Fatal(err.to_string())));

        BootstrapReport {
            state: BootstrapState::Uninitialized,
            phases,
        }
    }

    fn reserve_pools(&self, config: &GuardConfig) -> PhaseResult {
        let reservation = config.engine.pool_reservation();

        let result = self
            .engine
            .initialize_broadcast()
            .and_then(|()| self.engine.reserve_pools(reservation));

        match result {
            Ok(()) => {
                tracing::info!(
                    hooks = reservation.hooks,
                    monitor_hooks = reservation.monitor_hooks,
                    "hook pools reserved"
                );
                self.complete(BootstrapStep::ReservePools);
                self.set_state(BootstrapState::PoolsReady);
                PhaseResult::Ok
            }
            Err(err) => {
                let err = GuardError::ResourceDegraded(err.to_string());
                tracing::warn!(%err, "hook pools unavailable");
                self.set_state(BootstrapState::Degraded);
                PhaseResult::Degraded(err.to_string())
            }
        }
    }

    fn enable_concealment(&self, config: &GuardConfig) -> PhaseResult {
        let request = config.concealment.request();

        match self.engine.enable_concealment(&request) {
            Ok(()) => {
                tracing::info!(
                    hide = request.hide,
                    by_process_id = request.by_process_id,
                    process_id = %request.process_id,
                    "concealment mode active"
                );
                self.complete(BootstrapStep::EnableConcealment);
                self.set_state(BootstrapState::ConcealmentConfigured);
                PhaseResult::Ok
            }
            Err(err) => {
                tracing::warn!(%err, "failed to activate concealment mode");
                PhaseResult::Degraded(err.to_string())
            }
        }
    }

    fn install_demo_hooks(&self) -> PhaseResult {
        let report = match self.install_hooks() {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(%err, "demonstration hooks not installed");
                return PhaseResult::Degraded(err.to_string());
            }
        };

        match report.is_success() {
            true => {
                self.set_state(BootstrapState::DemoHooksInstalled);
                PhaseResult::Ok
            }
            false => {
                tracing::warn!(
                    status = %report.status,
                    hooks_installed = report.hooks_installed,
                    "demonstration hooks not installed"
                );
                PhaseResult::Degraded(format!(
                    "{} of 2 hooks installed, status {}",
                    report.hooks_installed, report.status
                ))
            }
        }
    }

    /// Installs the demonstration hooks.
    ///
    /// Fails with [`GuardError::EngineNotReady`] unless the engine step is
    /// on the ledger. The ledger stays locked for the whole install. The
    /// hooks step is recorded whenever the engine is left redirecting any
    /// target, including one without a usable trampoline.
    pub fn install_hooks(&self) -> Result<InstallReport, GuardError> {
        let mut ledger = self.ledger();
        if !ledger.contains(&BootstrapStep::InitializeEngine) {
            tracing::warn!("install requested before the engine is running");
            return Err(GuardError::EngineNotReady);
        }

        let report = self.hooks.install();

        if self.hooks.manager().has_redirections()
            && !ledger.contains(&BootstrapStep::InstallDemoHooks)
        {
            tracing::debug!(step = %BootstrapStep::InstallDemoHooks, "step completed");
            ledger.push(BootstrapStep::InstallDemoHooks);
        }

        Ok(report)
    }

    /// Removes every demonstration hook and drops the hooks step from the
    /// ledger.
    ///
    /// Fails with [`GuardError::EngineNotReady`] unless the engine step is
    /// on the ledger.
    pub fn remove_hooks(&self) -> Result<(), GuardError> {
        let mut ledger = self.ledger();
        if !ledger.contains(&BootstrapStep::InitializeEngine) {
            tracing::warn!("unhook requested before the engine is running");
            return Err(GuardError::EngineNotReady);
        }

        self.hooks.unhook_all();
        ledger.retain(|step| *step != BootstrapStep::InstallDemoHooks);

        Ok(())
    }

    /// Undoes every completed step, most recent first.
    ///
    /// Safe to call more than once; each step is undone exactly once.
    pub fn teardown(&self) {
        loop {
            // Don't hold the ledger across the undo.
            let step = match self.ledger().pop() {
                Some(step) => step,
                None => break,
            };

            match step {
                BootstrapStep::InstallDemoHooks => self.hooks.unhook_all(),
                BootstrapStep::EnableConcealment => self.engine.disable_concealment(),
                BootstrapStep::ReservePools => self.engine.release_pools(),
                BootstrapStep::InitializeEngine => self.engine.shutdown(),
                BootstrapStep::CreateSymbolicLink => {
                    self.device.delete_symbolic_link(SYMBOLIC_LINK_NAME)
                }
                BootstrapStep::CreateDevice => self.device.delete_device(),
            }

            tracing::info!(%step, "step undone");
        }

        self.set_state(BootstrapState::Uninitialized);
    }
}
