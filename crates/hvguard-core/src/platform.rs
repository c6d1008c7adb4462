use crate::{GuardError, ProcessId, ProcessorNumber, Va};

/// A trait for reading kernel memory.
pub trait MemoryReader {
    /// Reads `buffer.len()` bytes starting at `address`.
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), GuardError>;
}

/// Operating-system services the guard consumes.
pub trait Platform: MemoryReader + Send + Sync {
    /// Resolves an exported routine by name.
    fn routine_address(&self, name: &str) -> Option<Va>;

    /// Returns the number of active logical processors.
    fn active_processor_count(&self) -> u32;

    /// Returns the processor the caller currently runs on.
    fn current_processor(&self) -> ProcessorNumber;

    /// Returns the id of the process the caller currently runs in.
    fn current_process_id(&self) -> ProcessId;
}
