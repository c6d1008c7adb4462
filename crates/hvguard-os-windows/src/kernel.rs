use bitflags::bitflags;
use hvguard_core::Va;

use crate::{ImageFileName, NtStatus};

/// The processor mode an access is checked against (`KPROCESSOR_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProcessorMode {
    /// `KernelMode`, the most privileged mode. Access checks are skipped.
    Kernel = 0,

    /// `UserMode`.
    User = 1,
}

bitflags! {
    /// An `ACCESS_MASK`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        /// `PROCESS_TERMINATE`
        const PROCESS_TERMINATE = 0x0001;
        /// `PROCESS_VM_OPERATION`
        const PROCESS_VM_OPERATION = 0x0008;
        /// `PROCESS_VM_READ`
        const PROCESS_VM_READ = 0x0010;
        /// `PROCESS_VM_WRITE`
        const PROCESS_VM_WRITE = 0x0020;
        /// `PROCESS_QUERY_INFORMATION`
        const PROCESS_QUERY_INFORMATION = 0x0400;
        /// `PROCESS_QUERY_LIMITED_INFORMATION`
        const PROCESS_QUERY_LIMITED_INFORMATION = 0x1000;
        /// `SYNCHRONIZE`
        const SYNCHRONIZE = 0x0010_0000;
        /// `PROCESS_ALL_ACCESS`
        const PROCESS_ALL_ACCESS = 0x001F_FFFF;
        /// `GENERIC_ALL`
        const GENERIC_ALL = 0x1000_0000;

        const _ = !0;
    }
}

/// A `SYSTEM_INFORMATION_CLASS` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemInformationClass(pub u32);

impl SystemInformationClass {
    /// `SystemBasicInformation`
    pub const BASIC_INFORMATION: Self = Self(0);

    /// `SystemProcessInformation`
    pub const PROCESS_INFORMATION: Self = Self(5);
}

/// Arguments of `ObpReferenceObjectByHandleWithTag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceObjectArgs {
    /// The handle to reference.
    pub handle: u64,

    /// The requested access.
    pub desired_access: AccessMask,

    /// The expected object type (`POBJECT_TYPE`).
    pub object_type: Va,

    /// The mode access is checked against.
    pub access_mode: ProcessorMode,

    /// The pool tag of the reference.
    pub tag: u32,

    /// Receives the object pointer (`PVOID*`).
    pub object: Va,

    /// Receives the handle information (`POBJECT_HANDLE_INFORMATION`).
    pub handle_information: Va,

    /// Trailing argument of the internal routine, passed through untouched.
    pub reserved: u64,
}

/// Arguments of `NtQuerySystemInformation`.
///
/// `buffer` is the caller's output buffer, mapped at `base`. The buffer
/// belongs to the caller; it is only ever edited in place.
#[derive(Debug)]
pub struct SystemInformationQuery<'a> {
    /// The requested information class.
    pub class: SystemInformationClass,

    /// Address of `buffer` in the caller's address space.
    pub base: Va,

    /// The output buffer.
    pub buffer: &'a mut [u8],

    /// Receives the number of bytes written or required.
    pub return_length: Option<&'a mut u32>,
}

/// The routines a policy handler replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// The access guard, replacing `ObpReferenceObjectByHandleWithTag`.
    AccessGuard,

    /// The enumeration filter, replacing `NtQuerySystemInformation`.
    EnumerationFilter,
}

/// Kernel services the policy handlers consume.
///
/// A driver implements the `call_*` methods by transmuting the trampoline
/// into the routine's `extern "system"` signature and calling it.
pub trait NtKernel: Send + Sync {
    /// Returns the image name of the process the caller runs in
    /// (`PsGetProcessImageFileName(PsGetCurrentProcess())`).
    fn current_image_file_name(&self) -> ImageFileName;

    /// Calls the original `ObpReferenceObjectByHandleWithTag` through
    /// `trampoline`.
    fn call_reference_object_by_handle(
        &self,
        trampoline: Va,
        args: ReferenceObjectArgs,
    ) -> NtStatus;

    /// Calls the original `NtQuerySystemInformation` through `trampoline`.
    fn call_query_system_information(
        &self,
        trampoline: Va,
        query: &mut SystemInformationQuery<'_>,
    ) -> NtStatus;

    /// Returns the entry point the engine redirects `policy`'s target to.
    fn replacement_routine(&self, policy: Policy) -> Va;
}
