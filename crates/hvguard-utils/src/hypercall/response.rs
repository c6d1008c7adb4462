/// The value a hypercall leaves in `RAX`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HypercallResult(pub u64);

impl HypercallResult {
    /// The operation succeeded.
    pub const SUCCESS: Self = Self(0);

    /// The operation failed, or the engine isn't running.
    pub const FAIL: Self = Self(u64::MAX);

    /// The verification key didn't match.
    pub const ERROR_INVALID_KEY: Self = Self(0xFFFF_FFFF_0000_0001);

    /// The operation code is unknown.
    pub const ERROR_INVALID_CODE: Self = Self(0xFFFF_FFFF_0000_0002);

    /// The signature a live engine answers a ping with.
    pub const SIGNATURE: Self = Self(0xE790_86E5_A198);

    /// Checks whether the value is one of the error values.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::FAIL | Self::ERROR_INVALID_KEY | Self::ERROR_INVALID_CODE
        )
    }

    /// Checks whether the value is the ping signature.
    pub fn is_signature(self) -> bool {
        self == Self::SIGNATURE
    }
}

impl std::fmt::Debug for HypercallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Self::SUCCESS => write!(f, "SUCCESS"),
            Self::FAIL => write!(f, "FAIL"),
            Self::ERROR_INVALID_KEY => write!(f, "ERROR_INVALID_KEY"),
            Self::ERROR_INVALID_CODE => write!(f, "ERROR_INVALID_CODE"),
            Self::SIGNATURE => write!(f, "SIGNATURE"),
            Self(value) => write!(f, "0x{value:016x}"),
        }
    }
}

impl std::fmt::Display for HypercallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
