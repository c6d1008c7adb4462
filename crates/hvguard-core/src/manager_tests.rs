use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{HookManager, InstallOutcome};
use crate::{
    Architecture, GuardError, HookEngine, HookRequest, HookState, HookTarget, MemoryReader,
    Platform, ProcessId, ProcessorNumber, TrampolineSlot, Va,
};

///////////////////////////////////////////////////////////////////////////////
// Mock Engine
///////////////////////////////////////////////////////////////////////////////

struct TestArch;

impl Architecture for TestArch {
    const NEAR_CALL: u8 = 0xe8;
    const NEAR_CALL_LEN: usize = 5;
    const KERNEL_BASE: u64 = 0xFFFF_0000_0000_0000;

    fn near_call_target(address: Va, instruction: &[u8]) -> Option<Va> {
        let displacement = i32::from_le_bytes(instruction.get(1..5)?.try_into().ok()?);
        Some((address + 5).wrapping_offset(displacement as i64))
    }
}

#[derive(Default)]
struct MockEngine {
    installs: Mutex<Vec<(ProcessorNumber, Va, Va, ProcessId)>>,
    unhooks: Mutex<usize>,
    reject: Mutex<Option<Va>>,
    trampoline_override: Mutex<Option<Va>>,
    /// Observes the slot of the hook being installed from "inside" the
    /// engine, before the trampoline is handed back.
    observed: Mutex<Option<Arc<TrampolineSlot>>>,
    observed_state: Mutex<Option<bool>>,
}

impl MockEngine {
    fn trampoline_for(target: Va) -> Va {
        Va(0xffff_a000_0000_0000 | (target.0 & 0xffff_ffff))
    }

    fn install_count(&self) -> usize {
        self.installs.lock().unwrap().len()
    }
}

impl HookEngine for MockEngine {
    type Architecture = TestArch;

    fn install_hook(
        &self,
        hint: ProcessorNumber,
        target: Va,
        replacement: Va,
        owner: ProcessId,
    ) -> Result<Va, GuardError> {
        self.installs
            .lock()
            .unwrap()
            .push((hint, target, replacement, owner));

        if let Some(slot) = self.observed.lock().unwrap().as_ref() {
            *self.observed_state.lock().unwrap() = Some(slot.is_published());
        }

        if *self.reject.lock().unwrap() == Some(target) {
            return Err(GuardError::Other("rejected"));
        }

        if let Some(trampoline) = *self.trampoline_override.lock().unwrap() {
            return Ok(trampoline);
        }

        Ok(Self::trampoline_for(target))
    }

    fn unhook_all(&self) {
        *self.unhooks.lock().unwrap() += 1;
    }

    fn is_running(&self) -> bool {
        true
    }
}

///////////////////////////////////////////////////////////////////////////////
// Mock Platform
///////////////////////////////////////////////////////////////////////////////

struct MockPlatform {
    exports: HashMap<&'static str, Va>,
    memory: HashMap<Va, Vec<u8>>,
}

const WRAPPER: Va = Va(0xfffff800_0010_0000);
const QUERY: Va = Va(0xfffff800_0020_0000);
const REPLACEMENT: Va = Va(0xfffff880_0000_1000);

impl MockPlatform {
    fn new() -> Self {
        let mut code = vec![0x90u8; 0x110];
        code[0x1a] = 0xe8;
        code[0x1b..0x1f].copy_from_slice(&0x4000i32.to_le_bytes());

        Self {
            exports: HashMap::from([("Wrapper", WRAPPER), ("Query", QUERY)]),
            memory: HashMap::from([(WRAPPER, code)]),
        }
    }
}

impl MemoryReader for MockPlatform {
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), GuardError> {
        let region = self
            .memory
            .get(&address)
            .ok_or(GuardError::Other("unmapped"))?;
        let source = region.get(..buffer.len()).ok_or(GuardError::OutOfBounds)?;
        buffer.copy_from_slice(source);
        Ok(())
    }
}

impl Platform for MockPlatform {
    fn routine_address(&self, name: &str) -> Option<Va> {
        self.exports.get(name).copied()
    }

    fn active_processor_count(&self) -> u32 {
        4
    }

    fn current_processor(&self) -> ProcessorNumber {
        ProcessorNumber(2)
    }

    fn current_process_id(&self) -> ProcessId {
        ProcessId(4)
    }
}

fn request(name: &'static str, target: HookTarget) -> (HookRequest, Arc<TrampolineSlot>) {
    let slot = Arc::new(TrampolineSlot::new());
    let request = HookRequest {
        name,
        target,
        replacement: REPLACEMENT,
        trampoline: slot.clone(),
    };
    (request, slot)
}

fn expected_internal() -> Va {
    WRAPPER + 0x1a + 5 + 0x4000
}

///////////////////////////////////////////////////////////////////////////////
// Install
///////////////////////////////////////////////////////////////////////////////

#[test]
fn install_resolves_called_routine() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());
    let platform = MockPlatform::new();

    let (request, slot) = request("guard", HookTarget::CalledBy("Wrapper"));
    let outcome = manager.install(&platform, request)?;

    let trampoline = MockEngine::trampoline_for(expected_internal());
    assert_eq!(outcome, InstallOutcome::Activated(trampoline));
    assert_eq!(slot.get(), Some(trampoline));
    assert_eq!(manager.state("guard"), Some(HookState::Active));

    let installs = engine.installs.lock().unwrap();
    assert_eq!(
        installs[0],
        (ProcessorNumber(2), expected_internal(), REPLACEMENT, ProcessId(4))
    );

    Ok(())
}

#[test]
fn install_exported_target() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());

    let (request, _slot) = request("filter", HookTarget::Export("Query"));
    manager.install(&MockPlatform::new(), request)?;

    assert_eq!(manager.snapshot(), [("filter", QUERY, HookState::Active)]);
    Ok(())
}

#[test]
fn trampoline_is_not_visible_during_engine_call() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());

    let (request, slot) = request("filter", HookTarget::Export("Query"));
    *engine.observed.lock().unwrap() = Some(slot.clone());

    manager.install(&MockPlatform::new(), request)?;

    assert_eq!(*engine.observed_state.lock().unwrap(), Some(false));
    assert!(slot.is_published());
    Ok(())
}

#[test]
fn rejected_install_leaves_no_record() {
    let engine = Arc::new(MockEngine::default());
    *engine.reject.lock().unwrap() = Some(QUERY);
    let manager = HookManager::new(engine.clone());

    let (request, slot) = request("filter", HookTarget::Export("Query"));
    let result = manager.install(&MockPlatform::new(), request);

    assert!(matches!(
        result,
        Err(GuardError::HookInstallFailed { target }) if target == QUERY
    ));
    assert_eq!(manager.state("filter"), None);
    assert!(manager.is_empty());
    assert!(!manager.has_redirections());
    assert!(!slot.is_published());
}

#[test]
fn user_half_trampoline_is_rejected() {
    let engine = Arc::new(MockEngine::default());
    *engine.trampoline_override.lock().unwrap() = Some(Va(0x7ff6_0000_1000));
    let manager = HookManager::new(engine.clone());

    let (request, slot) = request("filter", HookTarget::Export("Query"));
    let result = manager.install(&MockPlatform::new(), request);

    assert!(matches!(result, Err(GuardError::InvalidTrampoline(_))));
    assert!(manager.is_empty());
    assert!(manager.has_redirections());
    assert!(!slot.is_published());
}

#[test]
fn redirection_without_trampoline_is_not_reinstalled() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    *engine.trampoline_override.lock().unwrap() = Some(Va(0x7ff6_0000_1000));
    let manager = HookManager::new(engine.clone());
    let platform = MockPlatform::new();

    let (first, _slot) = request("filter", HookTarget::Export("Query"));
    assert!(manager.install(&platform, first).is_err());

    // The engine still redirects the target; it must not see it twice.
    *engine.trampoline_override.lock().unwrap() = None;
    let (second, slot) = request("filter", HookTarget::Export("Query"));
    let result = manager.install(&platform, second);

    assert!(matches!(
        result,
        Err(GuardError::HookInstallFailed { target }) if target == QUERY
    ));
    assert_eq!(engine.install_count(), 1);
    assert!(!slot.is_published());

    manager.unhook_all();
    assert!(!manager.has_redirections());

    let (third, slot) = request("filter", HookTarget::Export("Query"));
    manager.install(&platform, third)?;
    assert_eq!(engine.install_count(), 2);
    assert!(slot.is_published());
    Ok(())
}

#[test]
fn missing_export_does_not_reach_engine() {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());

    let (request, _slot) = request("guard", HookTarget::CalledBy("Missing"));
    let result = manager.install(&MockPlatform::new(), request);

    assert!(matches!(result, Err(GuardError::ExportNotFound("Missing"))));
    assert_eq!(engine.install_count(), 0);
    assert!(manager.is_empty());
}

#[test]
fn second_install_is_idempotent() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());
    let platform = MockPlatform::new();

    let (first, _slot) = request("filter", HookTarget::Export("Query"));
    let first = manager.install(&platform, first)?;

    let (second, _slot) = request("filter", HookTarget::Export("Query"));
    let second = manager.install(&platform, second)?;

    assert_eq!(second, InstallOutcome::AlreadyActive(first.trampoline()));
    assert_eq!(engine.install_count(), 1);
    assert_eq!(manager.active_count(), 1);
    Ok(())
}

#[test]
fn concurrent_installs_reach_engine_once() {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());
    let platform = MockPlatform::new();

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let (request, _slot) = request("filter", HookTarget::Export("Query"));
                    manager.install(&platform, request)
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect()
    });

    assert_eq!(engine.install_count(), 1);
    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Ok(InstallOutcome::Activated(_))))
            .count(),
        1
    );
    assert_eq!(manager.state("filter"), Some(HookState::Active));
}

///////////////////////////////////////////////////////////////////////////////
// Unhook
///////////////////////////////////////////////////////////////////////////////

#[test]
fn unhook_all_clears_every_record() -> Result<(), GuardError> {
    let engine = Arc::new(MockEngine::default());
    let manager = HookManager::new(engine.clone());
    let platform = MockPlatform::new();

    let (guard, guard_slot) = request("guard", HookTarget::CalledBy("Wrapper"));
    let (filter, filter_slot) = request("filter", HookTarget::Export("Query"));
    manager.install(&platform, guard)?;
    manager.install(&platform, filter)?;
    assert_eq!(manager.active_count(), 2);

    manager.unhook_all();

    assert_eq!(*engine.unhooks.lock().unwrap(), 1);
    assert!(manager.is_empty());
    assert_eq!(manager.state("guard"), None);
    assert!(!guard_slot.is_published());
    assert!(!filter_slot.is_published());

    // Reinstalling after a global unhook goes back to the engine.
    let (filter, _slot) = request("filter", HookTarget::Export("Query"));
    manager.install(&platform, filter)?;
    assert_eq!(engine.install_count(), 3);

    Ok(())
}
