//! Architecture-specific instruction knowledge.

use crate::Va;

/// Defines an interface for CPU architecture-specific constants and
/// instruction decoding.
///
/// The target resolver and the hook lifecycle manager are generic over this
/// trait so they never hard-code an instruction encoding.
pub trait Architecture {
    /// The opcode of a relative near call.
    ///
    /// # Architecture-specific
    ///
    /// - **AMD64**: `0xe8` (`CALL rel32`)
    const NEAR_CALL: u8;

    /// The length of a relative near call instruction in bytes.
    ///
    /// # Architecture-specific
    ///
    /// - **AMD64**: `5` (opcode + 32-bit displacement)
    const NEAR_CALL_LEN: usize;

    /// The lowest address of the kernel half of the address space.
    ///
    /// # Architecture-specific
    ///
    /// - **AMD64**: `0xFFFF000000000000`
    const KERNEL_BASE: u64;

    /// Decodes the target of a relative near call located at `address`.
    ///
    /// `instruction` starts at the opcode byte. Returns `None` if the bytes
    /// don't encode a near call or are too short.
    fn near_call_target(address: Va, instruction: &[u8]) -> Option<Va>;

    /// Checks whether `va` lies in the kernel half of the address space.
    fn is_kernel_address(va: Va) -> bool {
        va.0 >= Self::KERNEL_BASE
    }
}
