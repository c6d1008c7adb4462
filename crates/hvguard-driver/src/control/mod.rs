//! The control plane.
//!
//! User mode talks to the driver through buffered I/O control requests on
//! the control device. Every request is completed exactly once, with a
//! status and the number of bytes written to the output buffer.

mod ioctl;
mod response;

use hvguard_core::GuardError;
use hvguard_os_windows::{InstallReport, NtStatus};
use zerocopy::IntoBytes;

pub use self::{
    ioctl::{
        ControlCode, FILE_ANY_ACCESS, FILE_DEVICE_HVGUARD, IOCTL_HVGUARD_INSTALL_DEMO_HOOKS,
        IOCTL_HVGUARD_PING, IOCTL_HVGUARD_UNHOOK_ALL, METHOD_BUFFERED, ctl_code,
    },
    response::{InstallHooksResponse, PingResponse},
};

/// A request on the control device.
#[derive(Debug)]
pub enum ControlRequest<'a> {
    /// The device was opened (`IRP_MJ_CREATE`).
    Create,

    /// The device was closed (`IRP_MJ_CLOSE`).
    Close,

    /// An I/O control request (`IRP_MJ_DEVICE_CONTROL`).
    DeviceControl {
        /// The control code.
        code: u32,

        /// The system buffer, sized to the caller's output buffer.
        output: &'a mut [u8],
    },
}

/// The completion of a control request (`IO_STATUS_BLOCK`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoCompletion {
    /// The request status.
    pub status: NtStatus,

    /// Number of bytes written to the output buffer.
    pub information: usize,
}

impl IoCompletion {
    /// Completes a request with a status and no output.
    pub fn status(status: NtStatus) -> Self {
        Self {
            status,
            information: 0,
        }
    }
}

/// The operations behind the control codes.
pub trait ControlHandler {
    /// Reports the engine status.
    fn ping(&self) -> PingResponse;

    /// Installs the demonstration hooks.
    fn install_demo_hooks(&self) -> Result<InstallReport, GuardError>;

    /// Removes every hook.
    fn unhook_all(&self) -> Result<(), GuardError>;
}

/// Dispatches a control request and completes it.
pub fn dispatch<Handler>(handler: &Handler, request: ControlRequest<'_>) -> IoCompletion
where
    Handler: ControlHandler + ?Sized,
{
    let (code, output) = match request {
        ControlRequest::Create | ControlRequest::Close => {
            tracing::debug!(?request, "control device request");
            return IoCompletion::status(NtStatus::SUCCESS);
        }
        ControlRequest::DeviceControl { code, output } => (code, output),
    };

    tracing::debug!(code = format_args!("{code:#x}"), "control request");

    let result = match ControlCode::try_from(code) {
        Ok(ControlCode::Ping) => write_response(output, || Ok(handler.ping())),
        Ok(ControlCode::InstallDemoHooks) => write_response(output, || {
            let report = handler.install_demo_hooks()?;
            Ok(InstallHooksResponse {
                status: report.status.0,
                hooks_installed: report.hooks_installed,
            })
        }),
        Ok(ControlCode::UnhookAll) => handler.unhook_all().map(|()| 0),
        Err(code) => {
            tracing::warn!(code = format_args!("{code:#x}"), "unknown control code");
            Err(GuardError::InvalidRequest(code))
        }
    };

    match result {
        Ok(information) => IoCompletion {
            status: NtStatus::SUCCESS,
            information,
        },
        Err(err) => {
            tracing::debug!(%err, "control request failed");
            IoCompletion::status(NtStatus::from(&err))
        }
    }
}

/// Runs `produce` and writes its result to the start of `output`.
///
/// `produce` only runs if the result fits; a short buffer is never written.
fn write_response<T>(
    output: &mut [u8],
    produce: impl FnOnce() -> Result<T, GuardError>,
) -> Result<usize, GuardError>
where
    T: IntoBytes + zerocopy::Immutable,
{
    let required = size_of::<T>();
    let actual = output.len();

    let target = match output.get_mut(..required) {
        Some(target) => target,
        None => {
            tracing::error!(required, actual, "output buffer too small");
            return Err(GuardError::BufferTooSmall { required, actual });
        }
    };

    let response = produce()?;
    target.copy_from_slice(response.as_bytes());
    Ok(required)
}
