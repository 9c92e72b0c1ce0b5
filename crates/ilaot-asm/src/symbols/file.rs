//! Loaded symbol file, owned or memory mapped.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use super::header::{HEADER_SIZE, SymbolHeader, SymbolOffsets};
use super::{RECORD_SIZE, SymbolError};

#[derive(Debug)]
enum Storage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Mapped(m) => m,
        }
    }
}

/// Symbol record with its strings resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolEntry<'a> {
    pub instruction_label: &'a str,
    pub method_label: &'a str,
    pub il_offset: u32,
    pub stack_depth: u32,
    pub method_token: u32,
    pub type_token: u32,
}

#[derive(Debug)]
pub struct SymbolFile {
    storage: Storage,
    header: SymbolHeader,
    offsets: SymbolOffsets,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl SymbolFile {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SymbolError> {
        Self::from_storage(Storage::Owned(bytes))
    }

    /// Memory map and validate a symbol file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SymbolError> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the file is not modified while loaded.
        let map = unsafe { Mmap::map(&file)? };
        Self::from_storage(Storage::Mapped(map))
    }

    fn from_storage(storage: Storage) -> Result<Self, SymbolError> {
        if storage.len() < HEADER_SIZE {
            return Err(SymbolError::FileTooSmall(storage.len()));
        }

        let header = SymbolHeader::from_bytes(&storage[..HEADER_SIZE]);
        if header.magic != super::MAGIC {
            return Err(SymbolError::InvalidMagic);
        }
        if header.version != super::VERSION {
            return Err(SymbolError::UnsupportedVersion(header.version));
        }
        if header.total_size as usize != storage.len() {
            return Err(SymbolError::SizeMismatch {
                header: header.total_size,
                actual: storage.len(),
            });
        }
        let actual = crc32fast::hash(&storage[HEADER_SIZE..]);
        if actual != header.checksum {
            return Err(SymbolError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let offsets = header.offsets();
        if offsets.end > storage.len() {
            return Err(SymbolError::Corrupt("sections extend past end of file"));
        }

        let file = Self {
            storage,
            header,
            offsets,
        };
        file.validate_strings()?;
        file.validate_records()?;
        Ok(file)
    }

    fn validate_strings(&self) -> Result<(), SymbolError> {
        let mut prev = 0;
        for i in 0..=self.header.str_count as usize {
            let off = read_u32(&self.storage, self.offsets.str_table + i * 4);
            if off < prev || off > self.header.str_blob_size {
                return Err(SymbolError::Corrupt("string offsets out of order"));
            }
            prev = off;
        }
        for i in 0..self.header.str_count {
            if std::str::from_utf8(self.string_bytes(i)).is_err() {
                return Err(SymbolError::Corrupt("string is not valid UTF-8"));
            }
        }
        Ok(())
    }

    fn validate_records(&self) -> Result<(), SymbolError> {
        for i in 0..self.len() {
            let [instruction, method, ..] = self.raw_record(i);
            if instruction >= self.header.str_count || method >= self.header.str_count {
                return Err(SymbolError::Corrupt("record references unknown string"));
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &SymbolHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.header.record_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn string_bytes(&self, id: u32) -> &[u8] {
        let at = self.offsets.str_table + id as usize * 4;
        let start = read_u32(&self.storage, at) as usize;
        let end = read_u32(&self.storage, at + 4) as usize;
        &self.storage[self.offsets.str_blob + start..self.offsets.str_blob + end]
    }

    fn string(&self, id: u32) -> &str {
        crate::invariants::ensure_utf8(self.string_bytes(id))
    }

    fn raw_record(&self, index: usize) -> [u32; 6] {
        let base = self.offsets.records + index * RECORD_SIZE;
        std::array::from_fn(|i| read_u32(&self.storage, base + i * 4))
    }

    pub fn get(&self, index: usize) -> Option<SymbolEntry<'_>> {
        if index >= self.len() {
            return None;
        }
        let [instruction, method, il_offset, stack_depth, method_token, type_token] =
            self.raw_record(index);
        Some(SymbolEntry {
            instruction_label: self.string(instruction),
            method_label: self.string(method),
            il_offset,
            stack_depth,
            method_token,
            type_token,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolEntry<'_>> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Records belonging to one method, in emission order.
    pub fn method_records<'a>(&'a self, method_label: &'a str) -> impl Iterator<Item = SymbolEntry<'a>> + 'a {
        self.iter().filter(move |e| e.method_label == method_label)
    }
}
