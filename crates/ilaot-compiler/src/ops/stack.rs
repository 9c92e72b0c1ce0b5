//! Operand stack model and the pure stack opcodes.

use ilaot_asm::{AluOp, Mem, Register::Esp};
use ilaot_core::{Instruction, Program, TypeId, TypeShape};

use super::OpContext;
use crate::Result;
use crate::layout::{Layouts, is_float, round4};

/// One value on the IL operand stack. Values occupy whole 4-byte words on
/// the machine stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackItem {
    pub size: u32,
    pub is_ref: bool,
    pub boxed: bool,
    pub is_float: bool,
    /// Managed or unmanaged pointer into a local, field or element.
    pub is_address: bool,
}

impl StackItem {
    pub fn value(size: u32) -> Self {
        Self {
            size,
            is_ref: false,
            boxed: false,
            is_float: false,
            is_address: false,
        }
    }

    pub fn reference() -> Self {
        Self {
            is_ref: true,
            ..Self::value(4)
        }
    }

    pub fn address() -> Self {
        Self {
            is_address: true,
            ..Self::value(4)
        }
    }

    pub fn boxed() -> Self {
        Self {
            boxed: true,
            ..Self::reference()
        }
    }

    pub fn float(size: u32) -> Self {
        Self {
            is_float: true,
            ..Self::value(size)
        }
    }

    /// Item for a value of static type `ty`.
    pub fn of_type(program: &Program, layouts: &Layouts<'_>, ty: TypeId) -> Result<Self> {
        let td = program.ty(ty)?;
        Ok(Self {
            size: layouts.storage_size(ty)?,
            is_ref: td.is_reference(),
            boxed: false,
            is_float: is_float(&td.full_name()),
            is_address: matches!(td.shape, TypeShape::Pointer { .. } | TypeShape::ByRef { .. }),
        })
    }

    pub fn bytes(&self) -> u32 {
        round4(self.size)
    }

    pub fn words(&self) -> u32 {
        self.bytes() / 4
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackModel {
    items: Vec<StackItem>,
}

impl StackModel {
    pub fn push(&mut self, item: StackItem) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<StackItem> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&StackItem> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Machine stack words held by the model.
    pub fn depth_words(&self) -> u32 {
        self.items.iter().map(StackItem::words).sum()
    }
}

pub(super) fn nop(_ctx: &mut OpContext<'_>, _instr: &Instruction) -> Result<()> {
    Ok(())
}

pub(super) fn dup(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let item = ctx.pop(instr.op)?;
    let top = (item.words() as i32 - 1) * 4;
    // each push moves esp, so the next lower word stays at the same offset
    for _ in 0..item.words() {
        ctx.asm.push(Mem::at(Esp, top));
    }
    ctx.push(item);
    ctx.push(item);
    Ok(())
}

pub(super) fn pop(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let item = ctx.pop(instr.op)?;
    if item.bytes() > 0 {
        ctx.asm.alu(AluOp::Add, Esp, item.bytes() as i32);
    }
    Ok(())
}
