use std::sync::Arc;

use hvguard_core::{HookRequest, HookTarget, ProtectedProcessSet};

use super::HookContext;
use crate::{AccessMask, NtKernel, NtStatus, Policy, ProcessorMode, ReferenceObjectArgs};

/// Neuters handle references taken by protected processes.
///
/// Replaces `ObpReferenceObjectByHandleWithTag`, the internal routine behind
/// `ObReferenceObjectByHandleWithTag`. When the calling process matches the
/// protected set, the reference is taken with no access and in kernel mode.
/// The caller gets a successful, but useless, reference instead of an error
/// it could detect.
pub struct AccessGuard<Kernel>
where
    Kernel: NtKernel,
{
    kernel: Arc<Kernel>,
    context: HookContext,
}

impl<Kernel> AccessGuard<Kernel>
where
    Kernel: NtKernel,
{
    /// Name of the hook record.
    pub const NAME: &'static str = "ObpReferenceObjectByHandleWithTag";

    /// The redirected routine.
    pub const TARGET: HookTarget = HookTarget::CalledBy("ObReferenceObjectByHandleWithTag");

    /// Creates a new access guard.
    pub fn new(kernel: Arc<Kernel>, protected: Arc<ProtectedProcessSet>) -> Self {
        Self {
            kernel,
            context: HookContext::new(protected),
        }
    }

    /// Returns the hook context.
    pub fn context(&self) -> &HookContext {
        &self.context
    }

    /// Builds the install request.
    pub fn request(&self) -> HookRequest {
        self.context.request(
            Self::NAME,
            Self::TARGET,
            self.kernel.replacement_routine(Policy::AccessGuard),
        )
    }

    /// Runs in place of the redirected routine.
    pub fn handle(&self, mut args: ReferenceObjectArgs) -> NtStatus {
        let trampoline = match self.context.trampoline() {
            Ok(trampoline) => trampoline,
            Err(_) => return NtStatus::UNSUCCESSFUL,
        };

        let image_name = self.kernel.current_image_file_name();
        if self.context.protected().matches_narrow(image_name.raw()) {
            if self.context.first_detection() {
                tracing::info!(
                    %image_name,
                    desired_access = ?args.desired_access,
                    access_mode = ?args.access_mode,
                    "protected process detected"
                );
            }

            args.desired_access = AccessMask::empty();
            args.access_mode = ProcessorMode::Kernel;
        }

        self.kernel.call_reference_object_by_handle(trampoline, args)
    }
}
