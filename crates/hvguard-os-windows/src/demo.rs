use std::sync::Arc;

use hvguard_core::{
    HookEngine, HookManager, HookRequest, InstallOutcome, Platform, ProtectedProcessSet,
};

use crate::{AccessGuard, EnumerationFilter, NtKernel, NtStatus};

/// Outcome of one demonstration-hook install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    /// `STATUS_SUCCESS` if every hook is active, otherwise the status of
    /// the first failure.
    pub status: NtStatus,

    /// Number of hooks active after the request.
    pub hooks_installed: u32,
}

impl InstallReport {
    /// Checks whether every hook is active.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The two demonstration policies.
///
/// Both handlers share one protected process set, fixed for the lifetime
/// of this object.
pub struct DemoPolicies<Kernel>
where
    Kernel: NtKernel,
{
    access_guard: AccessGuard<Kernel>,
    enumeration_filter: EnumerationFilter<Kernel>,
}

impl<Kernel> DemoPolicies<Kernel>
where
    Kernel: NtKernel,
{
    /// Creates both policies.
    pub fn new(kernel: Arc<Kernel>, protected: Arc<ProtectedProcessSet>) -> Self {
        Self {
            access_guard: AccessGuard::new(kernel.clone(), protected.clone()),
            enumeration_filter: EnumerationFilter::new(kernel, protected),
        }
    }

    /// Returns the access guard.
    pub fn access_guard(&self) -> &AccessGuard<Kernel> {
        &self.access_guard
    }

    /// Returns the enumeration filter.
    pub fn enumeration_filter(&self) -> &EnumerationFilter<Kernel> {
        &self.enumeration_filter
    }

    /// Returns the install requests, in install order.
    pub fn requests(&self) -> [HookRequest; 2] {
        [
            self.access_guard.request(),
            self.enumeration_filter.request(),
        ]
    }

    /// Installs both policies, stopping at the first failure.
    ///
    /// A policy that is already active counts as installed; the engine is
    /// not asked again.
    pub fn install<Engine>(
        &self,
        manager: &HookManager<Engine>,
        platform: &dyn Platform,
    ) -> InstallReport
    where
        Engine: HookEngine,
    {
        let mut hooks_installed = 0;

        for request in self.requests() {
            let name = request.name;

            match manager.install(platform, request) {
                Ok(InstallOutcome::Activated(trampoline)) => {
                    tracing::info!(name, %trampoline, "demonstration hook installed");
                    hooks_installed += 1;
                }
                Ok(InstallOutcome::AlreadyActive(_)) => {
                    hooks_installed += 1;
                }
                Err(err) => {
                    tracing::error!(name, %err, "demonstration hook failed");
                    return InstallReport {
                        status: NtStatus::from(&err),
                        hooks_installed,
                    };
                }
            }
        }

        InstallReport {
            status: NtStatus::SUCCESS,
            hooks_installed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use hvguard_arch_amd64::Amd64;
    use hvguard_core::{
        GuardError, HookState, MemoryReader, ProcessId, ProcessorNumber, TrampolineSlot, Va,
    };

    use super::*;
    use crate::{ImageFileName, Policy, ReferenceObjectArgs, SystemInformationQuery};

    struct MockEngine {
        installs: Mutex<Vec<Va>>,
        reject: Option<Va>,
    }

    impl HookEngine for MockEngine {
        type Architecture = Amd64;

        fn install_hook(
            &self,
            _hint: ProcessorNumber,
            target: Va,
            _replacement: Va,
            _owner: ProcessId,
        ) -> Result<Va, GuardError> {
            self.installs.lock().unwrap().push(target);
            if self.reject == Some(target) {
                return Err(GuardError::Other("no hooking page"));
            }

            Ok(Va(0xffff_d000_0000_0000 | (target.0 & 0xffff)))
        }

        fn unhook_all(&self) {}

        fn is_running(&self) -> bool {
            true
        }
    }

    struct MockKernel;

    impl NtKernel for MockKernel {
        fn current_image_file_name(&self) -> ImageFileName {
            ImageFileName::new("System")
        }

        fn call_reference_object_by_handle(&self, _: Va, _: ReferenceObjectArgs) -> NtStatus {
            NtStatus::SUCCESS
        }

        fn call_query_system_information(
            &self,
            _: Va,
            _: &mut SystemInformationQuery<'_>,
        ) -> NtStatus {
            NtStatus::SUCCESS
        }

        fn replacement_routine(&self, policy: Policy) -> Va {
            match policy {
                Policy::AccessGuard => Va(0xfffff880_0000_1000),
                Policy::EnumerationFilter => Va(0xfffff880_0000_2000),
            }
        }
    }

    const WRAPPER: Va = Va(0xfffff806_1a40_0000);
    const QUERY: Va = Va(0xfffff806_1a80_0000);

    struct MockPlatform;

    impl MemoryReader for MockPlatform {
        fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), GuardError> {
            if address != WRAPPER {
                return Err(GuardError::OutOfBounds);
            }

            // sub rsp, 48h; call ObpReferenceObjectByHandleWithTag
            buffer.fill(0xcc);
            buffer[..4].copy_from_slice(&[0x48, 0x83, 0xec, 0x48]);
            buffer[4] = 0xe8;
            buffer[5..9].copy_from_slice(&0x2000i32.to_le_bytes());
            Ok(())
        }
    }

    impl hvguard_core::Platform for MockPlatform {
        fn routine_address(&self, name: &str) -> Option<Va> {
            match name {
                "ObReferenceObjectByHandleWithTag" => Some(WRAPPER),
                "NtQuerySystemInformation" => Some(QUERY),
                _ => None,
            }
        }

        fn active_processor_count(&self) -> u32 {
            8
        }

        fn current_processor(&self) -> ProcessorNumber {
            ProcessorNumber(0)
        }

        fn current_process_id(&self) -> ProcessId {
            ProcessId(4)
        }
    }

    fn setup(reject: Option<Va>) -> (HookManager<MockEngine>, DemoPolicies<MockKernel>) {
        let engine = Arc::new(MockEngine {
            installs: Mutex::new(Vec::new()),
            reject,
        });
        let protected = Arc::new(ProtectedProcessSet::new(["cheatengine", "ida"]));

        (
            HookManager::new(engine),
            DemoPolicies::new(Arc::new(MockKernel), protected),
        )
    }

    #[test]
    fn installs_both_policies() {
        let (manager, policies) = setup(None);

        let report = policies.install(&manager, &MockPlatform);
        assert_eq!(
            report,
            InstallReport {
                status: NtStatus::SUCCESS,
                hooks_installed: 2
            }
        );

        assert_eq!(
            manager.snapshot(),
            [
                ("ObpReferenceObjectByHandleWithTag", WRAPPER + 9 + 0x2000, HookState::Active),
                ("NtQuerySystemInformation", QUERY, HookState::Active),
            ]
        );

        let slot: &TrampolineSlot = policies.access_guard().context().slot();
        assert!(slot.is_published());
        assert!(policies.enumeration_filter().context().slot().is_published());
    }

    #[test]
    fn stops_at_first_failure() {
        let (manager, policies) = setup(Some(WRAPPER + 9 + 0x2000));

        let report = policies.install(&manager, &MockPlatform);
        assert!(!report.is_success());
        assert_eq!(report.status, NtStatus::UNSUCCESSFUL);
        assert_eq!(report.hooks_installed, 0);

        // The enumeration filter was never attempted.
        assert_eq!(manager.engine().installs.lock().unwrap().len(), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn second_install_reports_both_active() {
        let (manager, policies) = setup(None);

        policies.install(&manager, &MockPlatform);
        let report = policies.install(&manager, &MockPlatform);

        assert!(report.is_success());
        assert_eq!(report.hooks_installed, 2);
        assert_eq!(manager.engine().installs.lock().unwrap().len(), 2);
    }
}
