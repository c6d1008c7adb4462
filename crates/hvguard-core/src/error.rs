use crate::Va;

/// An error that can occur when guarding processes through the hook engine.
#[derive(thiserror::Error, Debug)]
pub enum GuardError {
    /// An error occurred in the hook engine.
    #[error(transparent)]
    Engine(Box<dyn std::error::Error + Send + Sync>),

    /// An OS-specific error occurred.
    #[error(transparent)]
    Os(Box<dyn std::error::Error + Send + Sync>),

    /// The resolver exhausted its scan window without finding the routine.
    #[error("Routine not found within {window:#x} bytes of {wrapper}")]
    RoutineNotFound {
        /// Entry address of the public wrapper that was scanned.
        wrapper: Va,

        /// Number of bytes inspected.
        window: usize,
    },

    /// An exported routine could not be located by name.
    #[error("Exported routine `{0}` not found")]
    ExportNotFound(&'static str),

    /// The caller's output buffer is smaller than the response.
    #[error("Buffer too small (required: {required}, actual: {actual})")]
    BufferTooSmall {
        /// Size of the response type.
        required: usize,

        /// Size of the caller's buffer.
        actual: usize,
    },

    /// The request code is not recognized.
    #[error("Invalid request code {0:#x}")]
    InvalidRequest(u32),

    /// The hook engine could not be initialized.
    #[error("Engine initialization failed: {0}")]
    EngineInitFailed(String),

    /// A soft dependency is missing; the subsystem runs with reduced capability.
    #[error("Running degraded: {0}")]
    ResourceDegraded(String),

    /// The engine rejected an install request.
    #[error("Hook installation failed for {target}")]
    HookInstallFailed {
        /// The routine that was supposed to be redirected.
        target: Va,
    },

    /// The engine returned a trampoline that cannot be called.
    #[error("Invalid trampoline address {0}")]
    InvalidTrampoline(Va),

    /// A handler ran before its trampoline was published.
    #[error("Trampoline not ready")]
    TrampolineNotReady,

    /// The hook engine is not running.
    #[error("Engine not ready")]
    EngineNotReady,

    /// The subsystem is being torn down.
    #[error("Unloading")]
    Unloading,

    /// Out of bounds.
    #[error("Out of bounds")]
    OutOfBounds,

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

impl GuardError {
    /// Wraps an error raised by a hook engine implementation.
    pub fn engine(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Engine(Box::new(err))
    }

    /// Wraps an error raised by an operating-system adapter.
    pub fn os(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Os(Box::new(err))
    }

    /// Returns `true` if the error must abort the whole subsystem.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineInitFailed(_))
    }
}
