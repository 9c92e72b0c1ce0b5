#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Program image model for the ilaot compiler.
//!
//! - [`image`]: the serialized program (type, field and method tables plus method bodies)
//! - [`opcode`]: bytecode instruction kinds, keyed by mnemonic
//! - [`naming`]: injective label escaping and the fixed label names
//! - [`interner`]: string deduplication for literal data and symbol blobs

pub mod image;
pub mod interner;
pub mod naming;
pub mod opcode;

#[cfg(test)]
mod image_tests;

pub use image::{
    CustomAssembler, ExceptionHandler, FieldDef, FieldId, FieldPlug, HandlerKind, ImplKind,
    Instruction, InterfaceImpl, LayoutKind, MethodBody, MethodDef, MethodId, MethodPlug, Operand,
    ParamDef, Plugs, Program, RuntimeHooks, TypeDef, TypeId, TypeKind, TypeShape, Visibility,
};
pub use interner::{Interner, StrId};
pub use opcode::OpCode;

/// Errors raised while loading or querying a program image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid program image: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid binary program image: {0}")]
    Binary(#[from] postcard::Error),

    #[error("cannot read program image: {0}")]
    Io(#[from] std::io::Error),

    #[error("type id {0} is out of range")]
    UnresolvedType(u32),

    #[error("field id {0} is out of range")]
    UnresolvedField(u32),

    #[error("method id {0} is out of range")]
    UnresolvedMethod(u32),

    #[error("type `{0}` not found")]
    TypeNotFound(String),

    #[error("type `{0}` is defined more than once")]
    DuplicateType(String),

    #[error("inheritance cycle through `{0}`")]
    InheritanceCycle(String),

    #[error("entry point `{0}.Init()` not found")]
    EntryPointNotFound(String),
}

pub type Result<T> = std::result::Result<T, ImageError>;
