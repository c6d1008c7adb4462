//! hvguard utilities

#[cfg(feature = "hypercall")]
pub mod hypercall;
