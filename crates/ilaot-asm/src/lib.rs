#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! x86 output for the ilaot compiler.
//!
//! The code generators write [`Instr`]s and data members into an
//! [`Assembler`]. The finished [`Assembly`] is either rendered as NASM text
//! ([`text`]) or encoded into a flat binary image ([`encode`]).

pub mod assembler;
pub mod encode;
pub mod instruction;
mod invariants;
pub mod register;
pub mod symbols;
pub mod text;

#[cfg(test)]
mod assembler_tests;
#[cfg(test)]
mod text_tests;

pub use assembler::{Assembler, Assembly};
pub use encode::{DEFAULT_ORIGIN, EncodeError, FlatImage, MAX_IMAGE_SIZE, encode};
pub use instruction::{
    AluOp, DataItem, DataMember, Instr, Item, Mem, MemBase, Operand, ShiftCount, ShiftOp, UnaryOp,
    Width,
};
pub use register::{Condition, Register};
pub use symbols::{DebugSymbol, SymbolError, SymbolFile, SymbolWriter};
