use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Response to [`ControlCode::Ping`].
///
/// [`ControlCode::Ping`]: super::ControlCode::Ping
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PingResponse {
    /// The engine signature.
    pub signature: u64,

    /// Number of active logical processors.
    pub processor_count: u32,

    /// Non-zero if the engine is running.
    pub is_running: u8,

    _reserved: [u8; 3],
}

impl PingResponse {
    /// Creates a new response.
    pub fn new(signature: u64, processor_count: u32, is_running: bool) -> Self {
        Self {
            signature,
            processor_count,
            is_running: is_running as u8,
            _reserved: [0; 3],
        }
    }

    /// Checks whether the engine is running.
    pub fn is_running(&self) -> bool {
        self.is_running != 0
    }
}

/// Response to [`ControlCode::InstallDemoHooks`].
///
/// [`ControlCode::InstallDemoHooks`]: super::ControlCode::InstallDemoHooks
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct InstallHooksResponse {
    /// `NTSTATUS` of the install request.
    pub status: i32,

    /// Number of active demonstration hooks.
    pub hooks_installed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(size_of::<PingResponse>(), 16);
        assert_eq!(size_of::<InstallHooksResponse>(), 8);
    }

    #[test]
    fn ping_wire_format() {
        let response = PingResponse::new(0xE79086E5A198, 8, true);

        let mut expected = Vec::new();
        expected.extend_from_slice(&0xE79086E5A198u64.to_ne_bytes());
        expected.extend_from_slice(&8u32.to_ne_bytes());
        expected.extend_from_slice(&[1, 0, 0, 0]);
        assert_eq!(response.as_bytes(), expected);

        let decoded = PingResponse::read_from_bytes(&expected).unwrap();
        assert!(decoded.is_running());
        assert_eq!(decoded, response);
    }
}
