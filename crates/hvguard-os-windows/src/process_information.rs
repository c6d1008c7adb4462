//! `SYSTEM_PROCESS_INFORMATION` buffers.
//!
//! `NtQuerySystemInformation(SystemProcessInformation, ...)` fills the
//! caller's buffer with a singly linked sequence of process records. Each
//! record starts with `NextEntryOffset`, the byte distance from the record
//! to its successor; the terminal record has an offset of zero. The image
//! name of a record is a `UNICODE_STRING` whose character buffer also lives
//! inside the output buffer.

use std::iter::FusedIterator;

use hvguard_core::Va;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    little_endian::{I32, I64, U16, U32, U64},
};

use crate::WindowsError;

/// A `UNICODE_STRING` as laid out on AMD64.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct UnicodeString {
    /// Length of the string in bytes, without terminator.
    pub length: U16,

    /// Capacity of the buffer in bytes.
    pub maximum_length: U16,

    _padding: [u8; 4],

    /// Address of the character buffer.
    pub buffer: U64,
}

/// The fixed header of a `SYSTEM_PROCESS_INFORMATION` record.
///
/// Only the fields up to `InheritedFromUniqueProcessId` are described; the
/// filter never needs the rest.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SystemProcessInformation {
    /// Byte offset from this record to the next one, zero for the last.
    pub next_entry_offset: U32,
    #[expect(missing_docs)]
    pub number_of_threads: U32,
    #[expect(missing_docs)]
    pub working_set_private_size: I64,
    #[expect(missing_docs)]
    pub hard_fault_count: U32,
    #[expect(missing_docs)]
    pub number_of_threads_high_watermark: U32,
    #[expect(missing_docs)]
    pub cycle_time: U64,
    #[expect(missing_docs)]
    pub create_time: I64,
    #[expect(missing_docs)]
    pub user_time: I64,
    #[expect(missing_docs)]
    pub kernel_time: I64,

    /// The image name of the process.
    pub image_name: UnicodeString,
    #[expect(missing_docs)]
    pub base_priority: I32,

    _padding: [u8; 4],
    #[expect(missing_docs)]
    pub unique_process_id: U64,
    #[expect(missing_docs)]
    pub inherited_from_unique_process_id: U64,
}

impl SystemProcessInformation {
    /// Size of the described header.
    pub const SIZE: usize = size_of::<Self>();
}

/// A `SystemProcessInformation` output buffer, mapped at `base`.
pub struct ProcessInformationBuffer<'a> {
    base: Va,
    bytes: &'a mut [u8],
}

impl<'a> ProcessInformationBuffer<'a> {
    /// Wraps a buffer that the kernel filled in at address `base`.
    pub fn new(base: Va, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Returns the address of the buffer.
    pub fn base(&self) -> Va {
        self.base
    }

    /// Returns the record header at `offset`.
    pub fn entry(&self, offset: usize) -> Result<&SystemProcessInformation, WindowsError> {
        let tail = self.bytes.get(offset..).ok_or(WindowsError::OutOfBounds {
            offset,
            size: self.bytes.len(),
        })?;

        SystemProcessInformation::ref_from_prefix(tail)
            .map(|(entry, _)| entry)
            .map_err(|_| WindowsError::CorruptedStruct("SYSTEM_PROCESS_INFORMATION"))
    }

    /// Returns the record header at `offset` for modification.
    fn entry_mut(&mut self, offset: usize) -> Result<&mut SystemProcessInformation, WindowsError> {
        let size = self.bytes.len();
        let tail = self
            .bytes
            .get_mut(offset..)
            .ok_or(WindowsError::OutOfBounds { offset, size })?;

        SystemProcessInformation::mut_from_prefix(tail)
            .map(|(entry, _)| entry)
            .map_err(|_| WindowsError::CorruptedStruct("SYSTEM_PROCESS_INFORMATION"))
    }

    /// Returns the `NextEntryOffset` of the record at `offset`.
    pub fn next_entry_offset(&self, offset: usize) -> Result<u32, WindowsError> {
        Ok(self.entry(offset)?.next_entry_offset.get())
    }

    /// Overwrites the `NextEntryOffset` of the record at `offset`.
    pub fn set_next_entry_offset(&mut self, offset: usize, value: u32) -> Result<(), WindowsError> {
        self.entry_mut(offset)?.next_entry_offset.set(value);
        Ok(())
    }

    /// Returns the UTF-16LE bytes of the image name of the record at `offset`.
    ///
    /// Returns `None` when the name is empty or its character buffer doesn't
    /// lie entirely inside this buffer. The name is never read from
    /// anywhere else.
    pub fn image_name(&self, offset: usize) -> Result<Option<&[u8]>, WindowsError> {
        let name = self.entry(offset)?.image_name;

        let address = Va(name.buffer.get());
        let length = usize::from(name.length.get());

        if address.is_null() || length == 0 || address < self.base {
            return Ok(None);
        }

        let start = match usize::try_from(address - self.base) {
            Ok(start) => start,
            Err(_) => return Ok(None),
        };

        Ok(start
            .checked_add(length)
            .and_then(|end| self.bytes.get(start..end)))
    }

    /// Returns an iterator over the record offsets, following the links
    /// from the first record.
    pub fn offsets(&self) -> ProcessInformationIterator<'_, 'a> {
        ProcessInformationIterator {
            buffer: self,
            current: Some(0),
        }
    }
}

/// An iterator over the records of a [`ProcessInformationBuffer`].
///
/// Yields the byte offset of each record, starting with the first.
pub struct ProcessInformationIterator<'b, 'a> {
    buffer: &'b ProcessInformationBuffer<'a>,
    current: Option<usize>,
}

impl ProcessInformationIterator<'_, '_> {
    fn __next(&mut self) -> Result<Option<usize>, WindowsError> {
        let offset = match self.current {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let next = self.buffer.next_entry_offset(offset)?;
        self.current = match next {
            0 => None,
            next => Some(offset + next as usize),
        };

        Ok(Some(offset))
    }
}

impl Iterator for ProcessInformationIterator<'_, '_> {
    type Item = Result<usize, WindowsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.__next();
        if result.is_err() {
            self.current = None;
        }

        result.transpose()
    }
}

impl FusedIterator for ProcessInformationIterator<'_, '_> {}
