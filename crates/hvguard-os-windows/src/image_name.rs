/// The short image name of a process (`EPROCESS.ImageFileName`).
///
/// A fixed 15-byte field that is NUL-padded when the name is shorter and
/// not terminated at all when it is exactly 15 bytes long. Long names are
/// truncated by the kernel.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFileName([u8; ImageFileName::CAPACITY]);

impl ImageFileName {
    /// Capacity of the field in bytes.
    pub const CAPACITY: usize = 15;

    /// Creates the field from raw bytes.
    pub const fn from_raw(raw: [u8; Self::CAPACITY]) -> Self {
        Self(raw)
    }

    /// Creates the field the way the kernel fills it: truncated to the
    /// capacity, NUL-padded.
    pub fn new(name: &str) -> Self {
        let mut raw = [0u8; Self::CAPACITY];
        let length = name.len().min(Self::CAPACITY);
        raw[..length].copy_from_slice(&name.as_bytes()[..length]);
        Self(raw)
    }

    /// Returns the whole field, padding included.
    pub fn raw(&self) -> &[u8; Self::CAPACITY] {
        &self.0
    }

    /// Returns the name without the NUL padding.
    pub fn as_bytes(&self) -> &[u8] {
        let length = self
            .0
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(Self::CAPACITY);
        &self.0[..length]
    }
}

impl std::fmt::Display for ImageFileName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for &byte in self.as_bytes() {
            write!(f, "{}", char::from(byte))?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for ImageFileName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ImageFileName({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_is_padded() {
        let name = ImageFileName::new("ida64.exe");
        assert_eq!(name.as_bytes(), b"ida64.exe");
        assert_eq!(name.raw()[9..], [0u8; 6]);
        assert_eq!(name.to_string(), "ida64.exe");
    }

    #[test]
    fn long_name_is_truncated_without_terminator() {
        let name = ImageFileName::new("cheatengine-x86_64.exe");
        assert_eq!(name.as_bytes(), b"cheatengine-x86");
        assert_eq!(name.as_bytes().len(), ImageFileName::CAPACITY);
    }
}
