/// Device type of the control device.
pub const FILE_DEVICE_HVGUARD: u32 = 0x8000;

/// `METHOD_BUFFERED`
pub const METHOD_BUFFERED: u32 = 0;

/// `FILE_ANY_ACCESS`
pub const FILE_ANY_ACCESS: u32 = 0;

/// Builds an I/O control code, like the `CTL_CODE` macro.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Queries the engine status.
pub const IOCTL_HVGUARD_PING: u32 =
    ctl_code(FILE_DEVICE_HVGUARD, 0x800, METHOD_BUFFERED, FILE_ANY_ACCESS);

/// Installs the demonstration hooks.
pub const IOCTL_HVGUARD_INSTALL_DEMO_HOOKS: u32 =
    ctl_code(FILE_DEVICE_HVGUARD, 0x801, METHOD_BUFFERED, FILE_ANY_ACCESS);

/// Removes every hook.
pub const IOCTL_HVGUARD_UNHOOK_ALL: u32 =
    ctl_code(FILE_DEVICE_HVGUARD, 0x802, METHOD_BUFFERED, FILE_ANY_ACCESS);

/// A recognized control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCode {
    /// [`IOCTL_HVGUARD_PING`]
    Ping,

    /// [`IOCTL_HVGUARD_INSTALL_DEMO_HOOKS`]
    InstallDemoHooks,

    /// [`IOCTL_HVGUARD_UNHOOK_ALL`]
    UnhookAll,
}

impl ControlCode {
    /// Returns the numeric control code.
    pub const fn code(self) -> u32 {
        match self {
            Self::Ping => IOCTL_HVGUARD_PING,
            Self::InstallDemoHooks => IOCTL_HVGUARD_INSTALL_DEMO_HOOKS,
            Self::UnhookAll => IOCTL_HVGUARD_UNHOOK_ALL,
        }
    }
}

impl TryFrom<u32> for ControlCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            IOCTL_HVGUARD_PING => Ok(Self::Ping),
            IOCTL_HVGUARD_INSTALL_DEMO_HOOKS => Ok(Self::InstallDemoHooks),
            IOCTL_HVGUARD_UNHOOK_ALL => Ok(Self::UnhookAll),
            _ => Err(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_codes() {
        assert_eq!(IOCTL_HVGUARD_PING, 0x8000_2000);
        assert_eq!(IOCTL_HVGUARD_INSTALL_DEMO_HOOKS, 0x8000_2004);
        assert_eq!(IOCTL_HVGUARD_UNHOOK_ALL, 0x8000_2008);
    }

    #[test]
    fn decode() {
        for code in [
            ControlCode::Ping,
            ControlCode::InstallDemoHooks,
            ControlCode::UnhookAll,
        ] {
            assert_eq!(ControlCode::try_from(code.code()), Ok(code));
        }

        assert_eq!(ControlCode::try_from(0x8000_200c), Err(0x8000_200c));
    }
}
