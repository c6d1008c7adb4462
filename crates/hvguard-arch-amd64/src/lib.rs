//! AMD64 architecture definitions.

mod instruction;

use hvguard_core::{Architecture, Va};

pub use self::instruction::NearCall;

/// AMD64 architecture.
#[derive(Debug)]
pub struct Amd64;

impl Architecture for Amd64 {
    const NEAR_CALL: u8 = NearCall::OPCODE;
    const NEAR_CALL_LEN: usize = NearCall::LEN;
    const KERNEL_BASE: u64 = 0xFFFF_0000_0000_0000;

    fn near_call_target(address: Va, instruction: &[u8]) -> Option<Va> {
        NearCall::decode(instruction).map(|call| call.target(address))
    }

    fn is_kernel_address(va: Va) -> bool {
        va.0 >= Self::KERNEL_BASE && Self::is_canonical(va)
    }
}

impl Amd64 {
    /// Checks whether `va` is canonical for 48-bit linear addresses.
    ///
    /// Bits 63:47 must all equal bit 47.
    pub fn is_canonical(va: Va) -> bool {
        let upper = va.0 >> 47;
        upper == 0 || upper == 0x1_ffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_addresses() {
        assert!(Amd64::is_canonical(Va(0x0000_7fff_ffff_ffff)));
        assert!(Amd64::is_canonical(Va(0xffff_8000_0000_0000)));
        assert!(!Amd64::is_canonical(Va(0x0000_8000_0000_0000)));
        assert!(!Amd64::is_canonical(Va(0xfff0_0000_0000_0000)));
    }

    #[test]
    fn kernel_half() {
        assert!(Amd64::is_kernel_address(Va(0xfffff801_2345_6789)));
        assert!(!Amd64::is_kernel_address(Va(0x7ff6_1234_0000)));
    }

    #[test]
    fn non_canonical_upper_half_is_not_kernel() {
        assert!(!Amd64::is_kernel_address(Va(0xffff_1000_0000_0000)));
        assert!(!Amd64::is_kernel_address(Va(0xffff_7fff_ffff_ffff)));
        assert!(Amd64::is_kernel_address(Va(0xffff_8000_0000_0000)));
    }
}
