use std::sync::Arc;

use hvguard_core::{HookRequest, HookTarget, ProtectedProcessSet};

use super::HookContext;
use crate::{
    NtKernel, NtStatus, Policy, ProcessInformationBuffer, SystemInformationClass,
    SystemInformationQuery, WindowsError,
};

/// Hides protected processes from process enumeration.
///
/// Replaces `NtQuerySystemInformation`. The original routine always runs
/// first; only a successful `SystemProcessInformation` query is filtered.
pub struct EnumerationFilter<Kernel>
where
    Kernel: NtKernel,
{
    kernel: Arc<Kernel>,
    context: HookContext,
}

impl<Kernel> EnumerationFilter<Kernel>
where
    Kernel: NtKernel,
{
    /// Name of the hook record.
    pub const NAME: &'static str = "NtQuerySystemInformation";

    /// The redirected routine.
    pub const TARGET: HookTarget = HookTarget::Export("NtQuerySystemInformation");

    /// Creates a new enumeration filter.
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
            self.kernel.replacement_routine(Policy::EnumerationFilter),
        )
    }

    /// Runs in place of the redirected routine.
    ///
    /// The status of the original routine is returned unchanged, even when
    /// the returned buffer turns out to be malformed.
    pub fn handle(&self, query: &mut SystemInformationQuery<'_>) -> NtStatus {
        let trampoline = match self.context.trampoline() {
            Ok(trampoline) => trampoline,
            Err(_) => return NtStatus::UNSUCCESSFUL,
        };

        let status = self.kernel.call_query_system_information(trampoline, query);
        if !status.is_success() || query.class != SystemInformationClass::PROCESS_INFORMATION {
            return status;
        }

        let mut buffer = ProcessInformationBuffer::new(query.base, &mut *query.buffer);
        match hide_protected(&mut buffer, self.context.protected()) {
            Ok(0) => {}
            Ok(hidden) => {
                if self.context.first_detection() {
                    tracing::info!(hidden, "protected processes hidden");
                }
            }
            Err(err) => {
                tracing::warn!(%err, "malformed process information buffer");
            }
        }

        status
    }
}

/// Unlinks every protected record from a process information buffer.
///
/// Keeps a cursor on the last surviving record. A protected record is
/// skipped by adding its own `NextEntryOffset` to the cursor's; a protected
/// terminal record makes the cursor the new terminal record. Skipped
/// records stay in place, the buffer is never compacted.
///
/// The first record is never hidden, since nothing points to it.
///
/// Returns the number of unlinked records. On error, the records unlinked
/// so far stay unlinked and the chain is still well formed.
pub fn hide_protected(
    buffer: &mut ProcessInformationBuffer<'_>,
    protected: &ProtectedProcessSet,
) -> Result<usize, WindowsError> {
    let mut previous = 0usize;
    let mut hidden = 0;

    loop {
        let link = buffer.next_entry_offset(previous)?;
        if link == 0 {
            break;
        }

        let current = previous
            .checked_add(link as usize)
            .ok_or(WindowsError::CorruptedStruct("NextEntryOffset"))?;

        let next = buffer.next_entry_offset(current)?;
        let is_protected = match buffer.image_name(current)? {
            Some(name) => protected.matches_wide_le(name),
            None => false,
        };

        if !is_protected {
            previous = current;
            continue;
        }

        let link = match next {
            0 => 0,
            next => link
                .checked_add(next)
                .ok_or(WindowsError::CorruptedStruct("NextEntryOffset"))?,
        };

        buffer.set_next_entry_offset(previous, link)?;
        hidden += 1;
    }

    Ok(hidden)
}
