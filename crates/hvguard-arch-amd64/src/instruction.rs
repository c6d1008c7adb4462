use hvguard_core::Va;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned, little_endian::I32};

/// A `CALL rel32` instruction.
///
/// The target is relative to the end of the instruction:
/// `target = address + 5 + displacement`.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct NearCall {
    opcode: u8,
    displacement: I32,
}

impl NearCall {
    /// The opcode byte.
    pub const OPCODE: u8 = 0xe8;

    /// The instruction length in bytes.
    pub const LEN: usize = size_of::<Self>();

    /// Decodes a near call from the start of `bytes`.
    ///
    /// Returns `None` if `bytes` is shorter than the instruction or doesn't
    /// start with the opcode.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (call, _) = Self::read_from_prefix(bytes).ok()?;
        (call.opcode == Self::OPCODE).then_some(call)
    }

    /// Returns the signed displacement.
    pub fn displacement(&self) -> i32 {
        self.displacement.get()
    }

    /// Returns the call target for an instruction located at `address`.
    pub fn target(&self, address: Va) -> Va {
        (address + Self::LEN as u64).wrapping_offset(i64::from(self.displacement()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_forward() {
        let call = NearCall::decode(&[0xe8, 0x10, 0x00, 0x00, 0x00, 0xcc]).unwrap();
        assert_eq!(call.displacement(), 0x10);
        assert_eq!(
            call.target(Va(0xfffff800_0000_1000)),
            Va(0xfffff800_0000_1015)
        );
    }

    #[test]
    fn decode_backward() {
        let call = NearCall::decode(&[0xe8, 0xfb, 0xff, 0xff, 0xff]).unwrap();
        assert_eq!(call.displacement(), -5);
        assert_eq!(
            call.target(Va(0xfffff800_0000_1000)),
            Va(0xfffff800_0000_1000)
        );
    }

    #[test]
    fn reject_truncated_or_other_opcode() {
        assert!(NearCall::decode(&[0xe8, 0x00, 0x00]).is_none());
        assert!(NearCall::decode(&[0xe9, 0x00, 0x00, 0x00, 0x00]).is_none());
    }
}
