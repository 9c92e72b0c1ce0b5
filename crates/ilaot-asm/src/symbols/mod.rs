//! Debug symbols: one record per emitted IL instruction.
//!
//! A record ties an instruction label to its method, IL offset and
//! operand-stack depth, plus the metadata tokens of the method and its
//! declaring type. Strings live once in a shared blob.

mod file;
mod header;


pub use file::{SymbolEntry, SymbolFile};
pub use header::{HEADER_SIZE, SymbolHeader, SymbolOffsets};

use ilaot_core::Interner;

pub const MAGIC: [u8; 4] = *b"ILDS";
pub const VERSION: u32 = 1;
/// Six little-endian u32 per record.
pub const RECORD_SIZE: usize = 24;

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("invalid magic: expected ILDS")]
    InvalidMagic,
    #[error("unsupported version: {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("file too small: {0} bytes (minimum 64)")]
    FileTooSmall(usize),
    #[error("size mismatch: header says {header} bytes, got {actual}")]
    SizeMismatch { header: u32, actual: usize },
    #[error("checksum mismatch: header says {expected:#010x}, content is {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("corrupt symbol file: {0}")]
    Corrupt(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One debug symbol, as produced by the code generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugSymbol {
    pub instruction_label: String,
    pub method_label: String,
    pub il_offset: u32,
    /// Operand-stack depth in 4-byte words, locals included.
    pub stack_depth: u32,
    pub method_token: u32,
    pub type_token: u32,
}

/// Accumulates symbols and serializes them into the file format.
#[derive(Debug, Default)]
pub struct SymbolWriter {
    strings: Interner,
    records: Vec<[u32; 6]>,
}

impl SymbolWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: &DebugSymbol) {
        let instruction = self.strings.intern(&symbol.instruction_label);
        let method = self.strings.intern(&symbol.method_label);
        self.records.push([
            instruction.as_u32(),
            method.as_u32(),
            symbol.il_offset,
            symbol.stack_depth,
            symbol.method_token,
            symbol.type_token,
        ]);
    }

    pub fn extend<'a>(&mut self, symbols: impl IntoIterator<Item = &'a DebugSymbol>) {
        for s in symbols {
            self.push(s);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let (blob, offsets) = self.strings.to_blob();
        let mut header = SymbolHeader {
            str_blob_size: blob.len() as u32,
            str_count: self.strings.len() as u32,
            record_count: self.records.len() as u32,
            ..SymbolHeader::default()
        };
        let layout = header.offsets();

        let mut out = vec![0u8; HEADER_SIZE];
        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&blob);
        out.resize(layout.records, 0);
        for record in &self.records {
            for field in record {
                out.extend_from_slice(&field.to_le_bytes());
            }
        }

        header.total_size = out.len() as u32;
        header.checksum = crc32fast::hash(&out[HEADER_SIZE..]);
        out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
        out
    }
}
