//! Direct hypercall path.
//!
//! A guest issues a `VMCALL` with an operation code, a verification key and
//! up to two parameters; the engine's VM-exit handler hands the registers
//! to [`Hypercall::dispatch`] and writes the returned [`HypercallResult`]
//! back into `RAX`. The dispatcher runs in root mode, where none of the
//! operating system's services are available.

mod packet;
mod response;

use std::sync::Arc;

use hvguard_core::HookEngine;

pub use self::{packet::HypercallPacket, response::HypercallResult};

/// The key every hypercall must carry.
pub const HYPERCALL_KEY: u64 = 0xE4B8_81E7_9C9F;

/// Hypercall operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum HypercallCode {
    /// Checks whether the engine is live.
    Ping = 0x00,

    /// Requests an EPT hook.
    ///
    /// Recognized, but always refused: resolving and installing a hook needs
    /// operating-system services that root mode has no access to.
    InstallEptHook = 0x01,
}

impl TryFrom<u64> for HypercallCode {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Ping),
            0x01 => Ok(Self::InstallEptHook),
            _ => Err(value),
        }
    }
}

/// The hypercall dispatcher.
pub struct Hypercall<Engine>
where
    Engine: HookEngine,
{
    engine: Arc<Engine>,
}

impl<Engine> Hypercall<Engine>
where
    Engine: HookEngine,
{
    /// Creates a new dispatcher.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Verifies and dispatches a hypercall.
    pub fn dispatch(&self, packet: HypercallPacket) -> HypercallResult {
        tracing::trace!(
            code = packet.code(),
            param1 = packet.param1(),
            param2 = packet.param2(),
            "hypercall"
        );

        if packet.key() != HYPERCALL_KEY {
            tracing::warn!(code = packet.code(), "hypercall with invalid key");
            return HypercallResult::ERROR_INVALID_KEY;
        }

        match HypercallCode::try_from(packet.code()) {
            Ok(HypercallCode::Ping) => match self.engine.is_running() {
                true => HypercallResult::SIGNATURE,
                false => HypercallResult::FAIL,
            },
            Ok(HypercallCode::InstallEptHook) => {
                tracing::warn!(
                    address = packet.param1(),
                    "hook installation over hypercall is not supported"
                );
                HypercallResult::FAIL
            }
            Err(code) => {
                tracing::warn!(code, "unknown hypercall");
                HypercallResult::ERROR_INVALID_CODE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use hvguard_core::{Architecture, GuardError, ProcessId, ProcessorNumber, Va};

    use super::*;

    struct TestArch;

    impl Architecture for TestArch {
        const NEAR_CALL: u8 = 0xe8;
        const NEAR_CALL_LEN: usize = 5;
        const KERNEL_BASE: u64 = 0xFFFF_0000_0000_0000;

        fn near_call_target(_address: Va, _instruction: &[u8]) -> Option<Va> {
            None
        }
    }

    #[derive(Default)]
    struct MockEngine {
        running: AtomicBool,
    }

    impl HookEngine for MockEngine {
        type Architecture = TestArch;

        fn install_hook(
            &self,
            _hint: ProcessorNumber,
            _target: Va,
            _replacement: Va,
            _owner: ProcessId,
        ) -> Result<Va, GuardError> {
            panic!("the hypercall path must not install hooks");
        }

        fn unhook_all(&self) {}

        fn is_running(&self) -> bool {
            self.running.load(Ordering::Relaxed)
        }
    }

    fn hypercall(running: bool) -> Hypercall<MockEngine> {
        let engine = MockEngine::default();
        engine.running.store(running, Ordering::Relaxed);
        Hypercall::new(Arc::new(engine))
    }

    #[test]
    fn ping_returns_signature() {
        let result = hypercall(true).dispatch(HypercallPacket::ping());
        assert_eq!(result, HypercallResult::SIGNATURE);
        assert!(result.is_signature());
    }

    #[test]
    fn ping_fails_without_engine() {
        let result = hypercall(false).dispatch(HypercallPacket::ping());
        assert_eq!(result, HypercallResult::FAIL);
        assert!(result.is_error());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let packet = HypercallPacket::ping().with_key(0x1234);
        assert_eq!(
            hypercall(true).dispatch(packet),
            HypercallResult::ERROR_INVALID_KEY
        );
    }

    #[test]
    fn key_is_checked_before_code() {
        let packet = HypercallPacket::new(0x42).with_key(0);
        assert_eq!(
            hypercall(true).dispatch(packet),
            HypercallResult::ERROR_INVALID_KEY
        );
    }

    #[test]
    fn unknown_code_is_rejected() {
        let packet = HypercallPacket::new(0x42);
        assert_eq!(
            hypercall(true).dispatch(packet),
            HypercallResult::ERROR_INVALID_CODE
        );
    }

    #[test]
    fn install_is_refused() {
        let packet = HypercallPacket::new(HypercallCode::InstallEptHook as u64)
            .with_param1(0xfffff801_0000_1000)
            .with_param2(0xfffff880_0000_2000);

        assert_eq!(hypercall(true).dispatch(packet), HypercallResult::FAIL);
    }

    #[test]
    fn result_values() {
        assert_eq!(HypercallResult::SIGNATURE.0, 0xE79086E5A198);
        assert!(!HypercallResult::SUCCESS.is_error());
        assert!(!HypercallResult::SIGNATURE.is_error());
        assert_eq!(format!("{:?}", HypercallResult(0x10)), "0x0000000000000010");
    }
}
