/// Error types for Windows operations.
#[derive(thiserror::Error, Debug)]
pub enum WindowsError {
    /// Corrupted struct.
    #[error("Corrupted struct: {0}")]
    CorruptedStruct(&'static str),

    /// An offset points outside of the buffer it belongs to.
    #[error("Offset {offset:#x} out of bounds (buffer size: {size:#x})")]
    OutOfBounds {
        /// The offending offset.
        offset: usize,

        /// Size of the buffer.
        size: usize,
    },
}

impl From<WindowsError> for hvguard_core::GuardError {
    fn from(value: WindowsError) -> Self {
        hvguard_core::GuardError::os(value)
    }
}
