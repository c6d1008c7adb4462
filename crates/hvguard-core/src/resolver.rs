//! Locating unexported routines.
//!
//! [`CallScanResolver`] finds the private routine behind a public wrapper
//! by decoding the first relative near call in the wrapper's machine code.
//! The technique depends on the exact code shape one compiler produced for
//! one OS build. A changed prologue yields either a clean
//! [`GuardError::RoutineNotFound`] or the target of some other call; the
//! resolver cannot tell the latter apart from success. Other strategies
//! (export tables, debug symbols) plug in through [`TargetResolver`].

use std::marker::PhantomData;

use crate::{Architecture, GuardError, MemoryReader, Va};

/// A strategy for locating the private routine behind a public wrapper.
pub trait TargetResolver: Send + Sync {
    /// Returns the address of the routine `wrapper` delegates to.
    fn resolve(&self, memory: &dyn MemoryReader, wrapper: Va) -> Result<Va, GuardError>;
}

/// Resolves the first relative near call within a bounded window.
pub struct CallScanResolver<Arch>
where
    Arch: Architecture + ?Sized,
{
    window: usize,
    _marker: PhantomData<fn() -> Arch>,
}

impl<Arch> CallScanResolver<Arch>
where
    Arch: Architecture + ?Sized,
{
    /// The default scan window in bytes.
    pub const DEFAULT_WINDOW: usize = 0x100;

    /// Creates a resolver scanning `window` bytes from the wrapper's entry.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            _marker: PhantomData,
        }
    }

    /// Returns the scan window in bytes.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Scans `code`, which was read from `wrapper`, for the first near call.
    ///
    /// Only opcodes within the first `window` bytes count; bytes past the
    /// window are only used as the displacement of a call starting inside it.
    pub fn scan(&self, wrapper: Va, code: &[u8]) -> Result<Va, GuardError> {
        let window = self.window.min(code.len());

        for offset in 0..window {
            if code[offset] != Arch::NEAR_CALL {
                continue;
            }

            let address = wrapper + offset as u64;
            if let Some(target) = Arch::near_call_target(address, &code[offset..]) {
                tracing::debug!(%wrapper, %address, %target, "found near call");
                return Ok(target);
            }
        }

        Err(GuardError::RoutineNotFound {
            wrapper,
            window: self.window,
        })
    }
}

impl<Arch> Default for CallScanResolver<Arch>
where
    Arch: Architecture + ?Sized,
{
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl<Arch> TargetResolver for CallScanResolver<Arch>
where
    Arch: Architecture + ?Sized,
{
    fn resolve(&self, memory: &dyn MemoryReader, wrapper: Va) -> Result<Va, GuardError> {
        // A call starting at the last byte of the window still needs its
        // displacement.
        let mut code = vec![0u8; self.window + Arch::NEAR_CALL_LEN - 1];
        memory.read(wrapper, &mut code)?;
        self.scan(wrapper, &code)
    }
}
