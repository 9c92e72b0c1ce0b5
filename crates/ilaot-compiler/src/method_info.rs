//! Stack frame layout of a method.
//!
//! ```text
//! [ebp + 8 + ...]  arguments, last parameter at the lowest offset
//! [ebp + 4]        return address
//! [ebp]            saved ebp
//! [ebp - 4 ...]    locals, then localloc slots
//! ```
//!
//! When the return value is wider than the arguments, the caller reserves
//! the difference below the arguments and every argument offset moves up
//! by it.

use std::fmt;

use ilaot_core::{MethodId, TypeId};

use crate::Result;
use crate::layout::{TypeInfo, round4};
use crate::session::{MethodData, Session};

pub const LOCALLOC_COUNT_KEY: &str = "LocAllocCount";

pub fn localloc_item_key(offset: u32) -> String {
    format!("LocAllocItem_L{offset:04X}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    In,
    Out,
    ByRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSlot {
    pub offset: u32,
    /// Rounded up to whole words.
    pub size: u32,
    pub is_reference: bool,
    pub ty: TypeId,
    /// `ebp`-relative address of each word, highest first.
    pub virtual_addresses: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgSlot {
    pub offset: u32,
    pub size: u32,
    pub is_reference: bool,
    pub kind: ArgKind,
    pub ty: TypeId,
    /// `ebp`-relative address of each word, lowest first.
    pub virtual_addresses: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub label: String,
    pub method: Option<MethodId>,
    pub locals: Vec<LocalSlot>,
    /// Declaration order, `this` first for instance methods.
    pub args: Vec<ArgSlot>,
    pub has_this: bool,
    pub return_type: Option<TypeId>,
    pub return_size: u32,
    pub locals_size: u32,
    pub extra_stack_size: i32,
    pub localloc_count: u32,
    pub type_info: Option<TypeInfo>,
    pub debug: bool,
}

impl MethodInfo {
    /// Frame of a generated routine with no arguments, locals or result.
    pub fn synthetic(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            method: None,
            locals: Vec::new(),
            args: Vec::new(),
            has_this: false,
            return_type: None,
            return_size: 0,
            locals_size: 0,
            extra_stack_size: 0,
            localloc_count: 0,
            type_info: None,
            debug: false,
        }
    }

    pub fn args_size(&self) -> u32 {
        self.args.iter().map(|a| a.size).sum()
    }

    /// Bytes the caller reserves below the arguments.
    pub fn padding(&self) -> u32 {
        self.extra_stack_size.max(0) as u32
    }

    /// Bytes the callee pops on return; the rest is the return value.
    pub fn ret_pop_size(&self) -> u32 {
        self.args_size() + self.padding() - round4(self.return_size)
    }

    /// `ebp`-relative address where the return value is stored.
    pub fn return_slot(&self) -> i32 {
        (8 + self.ret_pop_size()) as i32
    }

    /// `ebp`-relative address of a localloc slot, numbered from 1.
    pub fn localloc_slot(&self, item: u32) -> i32 {
        -((self.locals_size + item * 4) as i32)
    }
}

/// Frame layout of `method_for_args` using the locals of `method_for_locals`.
/// Every local, argument and return type is registered.
pub fn resolve_method(
    session: &Session<'_>,
    method_for_args: MethodId,
    method_for_locals: MethodId,
    label: &str,
    type_info: Option<TypeInfo>,
    debug: bool,
    data: &MethodData,
) -> Result<MethodInfo> {
    let program = session.program();
    let layouts = session.layouts();
    let method = program.method(method_for_args)?;

    let mut locals = Vec::new();
    let mut locals_size = 0;
    if let Some(body) = &program.method(method_for_locals)?.body {
        for &ty in &body.locals {
            session.register_type(ty)?;
            let size = layouts.stack_size(ty)?;
            let virtual_addresses = (0..size / 4)
                .map(|i| -((locals_size + (i + 1) * 4) as i32))
                .collect();
            locals.push(LocalSlot {
                offset: locals_size,
                size,
                is_reference: program.ty(ty)?.is_reference(),
                ty,
                virtual_addresses,
            });
            locals_size += size;
        }
    }

    // (type, kind) in declaration order
    let mut declared = Vec::new();
    if method.is_instance() {
        declared.push((method.declaring, ArgKind::In));
    }
    // `this` of a value type method is the address of the value
    let this_by_address = method.is_instance() && program.ty(method.declaring)?.is_value_type();
    for param in &method.params {
        let kind = match (param.is_in, param.is_out) {
            (true, true) => ArgKind::ByRef,
            (false, true) => ArgKind::Out,
            _ => ArgKind::In,
        };
        declared.push((param.ty, kind));
    }

    let mut args = Vec::with_capacity(declared.len());
    let mut offset = 0;
    for (i, &(ty, kind)) in declared.iter().enumerate().rev() {
        session.register_type(ty)?;
        let size = if i == 0 && this_by_address {
            4
        } else {
            layouts.stack_size(ty)?
        };
        args.push(ArgSlot {
            offset,
            size,
            is_reference: program.ty(ty)?.is_reference(),
            kind,
            ty,
            virtual_addresses: Vec::new(),
        });
        offset += size;
    }
    args.reverse();

    let return_size = match method.return_type {
        Some(ty) => {
            session.register_type(ty)?;
            layouts.storage_size(ty)?
        }
        None => 0,
    };
    let extra_stack_size = round4(return_size) as i32 - offset as i32;
    let shift = extra_stack_size.max(0) as u32;
    for arg in &mut args {
        arg.offset += shift;
        arg.virtual_addresses = (0..arg.size / 4)
            .map(|i| (arg.offset + (i + 1) * 4 + 4) as i32)
            .collect();
    }

    let localloc_count = data
        .get(LOCALLOC_COUNT_KEY)
        .copied()
        .unwrap_or(0)
        .max(0) as u32;

    Ok(MethodInfo {
        label: label.to_owned(),
        method: Some(method_for_args),
        locals,
        args,
        has_this: method.is_instance(),
        return_type: method.return_type,
        return_size,
        locals_size,
        extra_stack_size,
        localloc_count,
        type_info,
        debug,
    })
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label)?;
        writeln!(f, "locals ({} bytes)", self.locals_size)?;
        for (i, local) in self.locals.iter().enumerate() {
            write!(f, "  [{i}] offset {} size {}", local.offset, local.size)?;
            if local.is_reference {
                f.write_str(" ref")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "arguments ({} bytes)", self.args_size())?;
        for (i, arg) in self.args.iter().enumerate() {
            let name = if self.has_this && i == 0 { "this" } else { "arg" };
            let kind = match arg.kind {
                ArgKind::In => "in",
                ArgKind::Out => "out",
                ArgKind::ByRef => "ref",
            };
            write!(f, "  [{i}] {name} offset {} size {} {kind}", arg.offset, arg.size)?;
            if arg.is_reference {
                f.write_str(" ref")?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "return size {}, extra stack {}",
            self.return_size, self.extra_stack_size
        )
    }
}
