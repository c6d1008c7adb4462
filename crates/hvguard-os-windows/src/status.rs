use hvguard_core::GuardError;

/// An `NTSTATUS` value.
///
/// Negative values are errors, everything else is success.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub i32);

impl NtStatus {
    /// `STATUS_SUCCESS`
    pub const SUCCESS: Self = Self(0);

    /// `STATUS_UNSUCCESSFUL`
    pub const UNSUCCESSFUL: Self = Self(0xC000_0001_u32 as i32);

    /// `STATUS_NOT_IMPLEMENTED`
    pub const NOT_IMPLEMENTED: Self = Self(0xC000_0002_u32 as i32);

    /// `STATUS_INFO_LENGTH_MISMATCH`
    pub const INFO_LENGTH_MISMATCH: Self = Self(0xC000_0004_u32 as i32);

    /// `STATUS_INVALID_DEVICE_REQUEST`
    pub const INVALID_DEVICE_REQUEST: Self = Self(0xC000_0010_u32 as i32);

    /// `STATUS_BUFFER_TOO_SMALL`
    pub const BUFFER_TOO_SMALL: Self = Self(0xC000_0023_u32 as i32);

    /// `STATUS_INSUFFICIENT_RESOURCES`
    pub const INSUFFICIENT_RESOURCES: Self = Self(0xC000_009A_u32 as i32);

    /// `STATUS_DEVICE_NOT_READY`
    pub const DEVICE_NOT_READY: Self = Self(0xC000_00A3_u32 as i32);

    /// Checks whether the status denotes success (`NT_SUCCESS`).
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Returns the raw value as an unsigned integer.
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl std::fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "NtStatus(0x{:08x})", self.as_u32())
    }
}

impl std::fmt::Display for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{:08x}", self.as_u32())
    }
}

impl From<&GuardError> for NtStatus {
    fn from(value: &GuardError) -> Self {
        match value {
            GuardError::BufferTooSmall { .. } => Self::BUFFER_TOO_SMALL,
            GuardError::InvalidRequest(_) => Self::INVALID_DEVICE_REQUEST,
            GuardError::ResourceDegraded(_) => Self::INSUFFICIENT_RESOURCES,
            GuardError::EngineNotReady | GuardError::Unloading => Self::DEVICE_NOT_READY,
            _ => Self::UNSUCCESSFUL,
        }
    }
}

impl From<GuardError> for NtStatus {
    fn from(value: GuardError) -> Self {
        Self::from(&value)
    }
}

#[cfg(test)]
mod tests {
    use hvguard_core::Va;

    use super::*;

    #[test]
    fn success_and_errors() {
        assert!(NtStatus::SUCCESS.is_success());
        assert!(!NtStatus::UNSUCCESSFUL.is_success());
        assert_eq!(NtStatus::BUFFER_TOO_SMALL.as_u32(), 0xC0000023);
        assert_eq!(NtStatus::INVALID_DEVICE_REQUEST.to_string(), "0xc0000010");
    }

    #[test]
    fn guard_errors_map_to_status() {
        let too_small = GuardError::BufferTooSmall {
            required: 16,
            actual: 4,
        };
        assert_eq!(NtStatus::from(&too_small), NtStatus::BUFFER_TOO_SMALL);
        assert_eq!(
            NtStatus::from(GuardError::InvalidRequest(0x1234)),
            NtStatus::INVALID_DEVICE_REQUEST
        );
        assert_eq!(
            NtStatus::from(GuardError::HookInstallFailed { target: Va(1) }),
            NtStatus::UNSUCCESSFUL
        );
        assert_eq!(
            NtStatus::from(GuardError::EngineNotReady),
            NtStatus::DEVICE_NOT_READY
        );
    }
}
