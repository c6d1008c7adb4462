use memchr::memmem;

/// The configured collection of name patterns identifying guarded processes.
///
/// Every pattern is kept in both a narrow (byte) and a wide (UTF-16) form so
/// the handlers can match the kernel's native name representations without
/// allocating. The set is fixed once constructed.
#[derive(Debug, Clone, Default)]
pub struct ProtectedProcessSet {
    narrow: Vec<Box<[u8]>>,
    wide: Vec<Box<[u16]>>,
}

impl ProtectedProcessSet {
    /// Creates a set from the given patterns. Empty patterns are ignored.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut narrow = Vec::new();
        let mut wide = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }

            narrow.push(pattern.as_bytes().into());
            wide.push(pattern.encode_utf16().collect());
        }

        Self { narrow, wide }
    }

    /// Returns the number of patterns.
    pub fn len(&self) -> usize {
        self.narrow.len()
    }

    /// Checks whether the set has no patterns.
    pub fn is_empty(&self) -> bool {
        self.narrow.is_empty()
    }

    /// Iterates over the patterns.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.narrow
            .iter()
            .filter_map(|pattern| std::str::from_utf8(pattern).ok())
    }

    /// Checks whether a narrow name contains any pattern.
    ///
    /// The name ends at the first NUL byte or at the end of the slice,
    /// whichever comes first; nothing past the slice is ever read.
    pub fn matches_narrow(&self, name: &[u8]) -> bool {
        let name = match memchr::memchr(0, name) {
            Some(nul) => &name[..nul],
            None => name,
        };

        self.narrow
            .iter()
            .any(|pattern| pattern.len() <= name.len() && memmem::find(name, pattern).is_some())
    }

    /// Checks whether a wide name contains any pattern.
    ///
    /// The name ends at the first NUL code unit or at the end of the slice.
    pub fn matches_wide(&self, name: &[u16]) -> bool {
        let name = match name.iter().position(|&unit| unit == 0) {
            Some(nul) => &name[..nul],
            None => name,
        };

        self.wide.iter().any(|pattern| {
            pattern.len() <= name.len() && name.windows(pattern.len()).any(|w| w == &pattern[..])
        })
    }

    /// Checks whether a little-endian UTF-16 name contains any pattern.
    ///
    /// Same as [`matches_wide`], but reads the code units straight out of a
    /// byte buffer. A trailing odd byte is ignored.
    ///
    /// [`matches_wide`]: Self::matches_wide
    pub fn matches_wide_le(&self, name: &[u8]) -> bool {
        let unit = |index: usize| u16::from_le_bytes([name[index * 2], name[index * 2 + 1]]);

        let mut length = name.len() / 2;
        if let Some(nul) = (0..length).position(|index| unit(index) == 0) {
            length = nul;
        }

        self.wide.iter().any(|pattern| {
            pattern.len() <= length
                && (0..=length - pattern.len()).any(|start| {
                    pattern
                        .iter()
                        .enumerate()
                        .all(|(offset, &expected)| unit(start + offset) == expected)
                })
        })
    }
}
