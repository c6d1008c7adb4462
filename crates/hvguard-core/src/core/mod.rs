pub(crate) mod macros;
mod ids;

use self::macros::impl_address;
pub use self::ids::{ProcessId, ProcessorNumber};

impl_address!(Va, u64, "virtual address in the guarded kernel's address space");
