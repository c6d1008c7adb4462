use super::{HYPERCALL_KEY, HypercallCode};

/// Hypercall packet.
///
/// Mirrors the register file of a `VMCALL`: the operation code in `RCX`,
/// the verification key in `RDX` and two parameters in `R8` and `R9`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HypercallPacket {
    code: u64,
    key: u64,
    param1: u64,
    param2: u64,
}

impl HypercallPacket {
    /// Creates a new packet with the given code and the expected key.
    pub fn new(code: u64) -> Self {
        Self {
            code,
            key: HYPERCALL_KEY,
            param1: 0,
            param2: 0,
        }
    }

    /// Creates a ping packet.
    pub fn ping() -> Self {
        Self::new(HypercallCode::Ping as u64)
    }

    /// Sets the verification key of the packet.
    pub fn with_key(self, key: u64) -> Self {
        Self { key, ..self }
    }

    /// Sets the first parameter of the packet.
    pub fn with_param1(self, param1: u64) -> Self {
        Self { param1, ..self }
    }

    /// Sets the second parameter of the packet.
    pub fn with_param2(self, param2: u64) -> Self {
        Self { param2, ..self }
    }

    /// Returns the operation code of the packet.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Returns the verification key of the packet.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Returns the first parameter of the packet.
    pub fn param1(&self) -> u64 {
        self.param1
    }

    /// Returns the second parameter of the packet.
    pub fn param2(&self) -> u64 {
        self.param2
    }
}
