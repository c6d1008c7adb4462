use hvguard_core::GuardError;

/// Name of the control device.
pub const DEVICE_NAME: &str = r"\Device\HvGuard";

/// Name of the symbolic link user mode opens the device through.
pub const SYMBOLIC_LINK_NAME: &str = r"\DosDevices\HvGuard";

/// The I/O manager services the bootstrap sequencer consumes.
///
/// Creation and deletion are driven by the sequencer's step ledger; a
/// `delete_*` call is only issued for an object whose `create_*` call
/// succeeded.
pub trait DeviceHost: Send + Sync {
    /// Creates the control device (`IoCreateDevice`).
    fn create_device(&self, name: &str) -> Result<(), GuardError>;

    /// Links `link` to `device` (`IoCreateSymbolicLink`).
    fn create_symbolic_link(&self, link: &str, device: &str) -> Result<(), GuardError>;

    /// Removes the symbolic link (`IoDeleteSymbolicLink`).
    fn delete_symbolic_link(&self, link: &str);

    /// Deletes the control device (`IoDeleteDevice`).
    fn delete_device(&self);
}
