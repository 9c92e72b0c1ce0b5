#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! ilaot compilation engine.
//!
//! Turns a [`Program`](ilaot_core::Program) image into x86 output:
//! - `scanner` - worklist reachability closure from the entry point and bootstrap hooks
//! - `layout` / `method_info` - object and frame layout
//! - `ops` - opcode dispatch map and per-instruction code generators
//! - `vmt` - virtual method discovery and the dispatch table initializer
//! - `regions` - exception handler region lookup
//! - `engine` - the facade driving all phases

pub mod config;
pub mod engine;
mod invariants;
pub mod layout;
pub mod method_info;
pub mod ops;
pub mod plugs;
pub mod regions;
pub mod scanner;
pub mod session;
pub mod vmt;

mod codegen;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod regions_tests;

pub use config::{CompileOptions, OutputKind, Target};
pub use engine::{CompileOutput, CompileStats, Engine, EngineBuilder};
pub use layout::{FieldInfo, Layouts, TypeInfo};
pub use method_info::{ArgKind, ArgSlot, LocalSlot, MethodInfo};
pub use plugs::PlugTable;
pub use session::{MethodData, MethodState, Session};

use ilaot_asm::EncodeError;
use ilaot_core::{ImageError, OpCode};

/// Errors that abort a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plug tables are already initialized")]
    PlugsAlreadyInitialized,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("type id {0} is out of range")]
    UnresolvedType(u32),

    #[error("field id {0} is out of range")]
    UnresolvedField(u32),

    #[error("method id {0} is out of range")]
    UnresolvedMethod(u32),

    #[error("type `{0}` not found")]
    TypeNotFound(String),

    #[error("entry point `{0}.Init()` not found")]
    EntryPointNotFound(String),

    #[error("field `{field}` is not part of the layout of `{ty}`")]
    FieldNotInLayout { field: String, ty: String },

    #[error(transparent)]
    Image(ImageError),

    #[error("multi-dimensional array `{0}` is not supported")]
    MultiDimensionalArray(String),

    #[error("opcode `{0}` is not supported")]
    UnsupportedOpCode(OpCode),

    #[error("`{op}` is not supported: {reason}")]
    Unsupported { op: OpCode, reason: String },

    #[error("`{op}` at IL_{offset:04X} has no usable operand")]
    MissingOperand { op: OpCode, offset: u32 },

    #[error("`{0}` cannot be added after the tables were frozen")]
    Frozen(String),

    #[error("`{key}` was already scanned in `{method}`")]
    DuplicateScan { method: String, key: String },

    #[error("operand stack underflow at `{op}` in `{method}`")]
    StackUnderflow { op: OpCode, method: String },

    #[error("binary encoding failed: {0}")]
    Encode(#[from] EncodeError),
}

impl From<ImageError> for Error {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::UnresolvedType(id) => Error::UnresolvedType(id),
            ImageError::UnresolvedField(id) => Error::UnresolvedField(id),
            ImageError::UnresolvedMethod(id) => Error::UnresolvedMethod(id),
            ImageError::TypeNotFound(name) => Error::TypeNotFound(name),
            ImageError::EntryPointNotFound(name) => Error::EntryPointNotFound(name),
            other => Error::Image(other),
        }
    }
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, Error>;
