//! Windows policies for hvguard.
//!
//! This crate knows how the Windows kernel lays out the data the two
//! demonstration policies touch, and implements the policies on top of the
//! [`NtKernel`] seam:
//!
//! - [`AccessGuard`] replaces `ObpReferenceObjectByHandleWithTag` and
//!   strips the access of handle references taken by protected processes.
//! - [`EnumerationFilter`] replaces `NtQuerySystemInformation` and unlinks
//!   protected processes from `SystemProcessInformation` results.
//!
//! [`DemoPolicies`] installs both through a [`HookManager`].
//!
//! [`HookManager`]: hvguard_core::HookManager

mod demo;
mod error;
mod image_name;
mod kernel;
pub mod policy;
mod process_information;
mod status;

pub use self::{
    demo::{DemoPolicies, InstallReport},
    error::WindowsError,
    image_name::ImageFileName,
    kernel::{
        AccessMask, NtKernel, Policy, ProcessorMode, ReferenceObjectArgs, SystemInformationClass,
        SystemInformationQuery,
    },
    policy::{AccessGuard, EnumerationFilter, HookContext},
    process_information::{
        ProcessInformationBuffer, ProcessInformationIterator, SystemProcessInformation,
        UnicodeString,
    },
    status::NtStatus,
};
