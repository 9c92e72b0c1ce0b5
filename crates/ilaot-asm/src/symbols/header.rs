//! Debug symbol file header (64 bytes).
//!
//! Layout: Header → StringTable → StringBlob → (pad to 4) → Records

use super::{MAGIC, RECORD_SIZE, VERSION};

pub const HEADER_SIZE: usize = 64;

/// First 64 bytes of a symbol file.
///
/// - 0-27: identity, sizes and counts (magic + 6 × u32)
/// - 28-63: reserved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolHeader {
    /// Magic bytes: b"ILDS"
    pub magic: [u8; 4],
    pub version: u32,
    /// CRC32 of everything after the header.
    pub checksum: u32,
    pub total_size: u32,
    pub str_blob_size: u32,
    pub str_count: u32,
    pub record_count: u32,
}

impl Default for SymbolHeader {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            checksum: 0,
            total_size: 0,
            str_blob_size: 0,
            str_count: 0,
            record_count: 0,
        }
    }
}

/// Byte offsets of the sections, derived from the header counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolOffsets {
    pub str_table: usize,
    pub str_blob: usize,
    pub records: usize,
    pub end: usize,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl SymbolHeader {
    /// Decode from at least 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: read_u32(bytes, 4),
            checksum: read_u32(bytes, 8),
            total_size: read_u32(bytes, 12),
            str_blob_size: read_u32(bytes, 16),
            str_count: read_u32(bytes, 20),
            record_count: read_u32(bytes, 24),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.total_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.str_blob_size.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.str_count.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.record_count.to_le_bytes());
        bytes
    }

    pub fn offsets(&self) -> SymbolOffsets {
        let str_table = HEADER_SIZE;
        let str_blob = str_table + (self.str_count as usize + 1) * 4;
        let records = (str_blob + self.str_blob_size as usize + 3) & !3;
        let end = records + self.record_count as usize * RECORD_SIZE;
        SymbolOffsets {
            str_table,
            str_blob,
            records,
            end,
        }
    }
}
