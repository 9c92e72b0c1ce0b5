//! String interning.
//!
//! Used for string literal data members and for the string blob of the
//! debug symbol file. Ids follow insertion order.

use indexmap::IndexSet;

/// Handle to an interned string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StrId(u32);

impl StrId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interner {
    strings: IndexSet<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the existing id when already present.
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(i) = self.strings.get_index_of(s) {
            return StrId(i as u32);
        }
        let (i, _) = self.strings.insert_full(s.to_owned());
        StrId(i as u32)
    }

    pub fn get(&self, s: &str) -> Option<StrId> {
        self.strings.get_index_of(s).map(|i| StrId(i as u32))
    }

    pub fn resolve(&self, id: StrId) -> Option<&str> {
        self.strings.get_index(id.0 as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrId, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (StrId(i as u32), s.as_str()))
    }

    /// Concatenated UTF-8 bytes plus the start offset of every string.
    ///
    /// The offset table has `len() + 1` entries; the last one is the blob size.
    pub fn to_blob(&self) -> (Vec<u8>, Vec<u32>) {
        let mut blob = Vec::new();
        let mut offsets = Vec::with_capacity(self.strings.len() + 1);
        for s in &self.strings {
            offsets.push(blob.len() as u32);
            blob.extend_from_slice(s.as_bytes());
        }
        offsets.push(blob.len() as u32);
        (blob, offsets)
    }
}
