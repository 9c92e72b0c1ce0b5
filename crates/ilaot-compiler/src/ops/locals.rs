//! Locals and arguments. Multi-word values are pushed from their highest
//! word down, so the lowest word ends up at `[esp]`.

use ilaot_asm::{Instr, Mem, Register::*};
use ilaot_core::{Instruction, OpCode, TypeId};

use super::{OpContext, StackItem, operand_index, unsupported};
use crate::Result;
use crate::layout::is_float;
use crate::method_info::{ArgSlot, LocalSlot};

fn local_index(instr: &Instruction) -> Result<usize> {
    Ok(match instr.op {
        OpCode::Ldloc0 | OpCode::Stloc0 | OpCode::Ldarg0 => 0,
        OpCode::Ldloc1 | OpCode::Stloc1 | OpCode::Ldarg1 => 1,
        OpCode::Ldloc2 | OpCode::Stloc2 | OpCode::Ldarg2 => 2,
        OpCode::Ldloc3 | OpCode::Stloc3 | OpCode::Ldarg3 => 3,
        _ => operand_index(instr)?,
    })
}

fn local<'a>(ctx: &OpContext<'a>, instr: &Instruction) -> Result<&'a LocalSlot> {
    let index = local_index(instr)?;
    ctx.info
        .locals
        .get(index)
        .ok_or_else(|| unsupported(instr, format!("local {index} is not declared")))
}

fn arg<'a>(ctx: &OpContext<'a>, instr: &Instruction) -> Result<&'a ArgSlot> {
    let index = local_index(instr)?;
    ctx.info
        .args
        .get(index)
        .ok_or_else(|| unsupported(instr, format!("argument {index} is not declared")))
}

fn slot_item(ctx: &OpContext<'_>, ty: TypeId, size: u32, is_ref: bool) -> Result<StackItem> {
    let name = ctx.program().ty(ty)?.full_name();
    Ok(StackItem {
        size,
        is_ref,
        boxed: false,
        is_float: is_float(&name),
        is_address: name.ends_with('&') || name.ends_with('*'),
    })
}

pub(super) fn ldloc(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = local(ctx, instr)?;
    for &addr in &slot.virtual_addresses {
        ctx.asm.push(Mem::at(Ebp, addr));
    }
    let item = slot_item(ctx, slot.ty, slot.size, slot.is_reference)?;
    ctx.push(item);
    Ok(())
}

pub(super) fn stloc(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = local(ctx, instr)?;
    ctx.pop(instr.op)?;
    for &addr in slot.virtual_addresses.iter().rev() {
        ctx.asm.pop(Mem::at(Ebp, addr));
    }
    Ok(())
}

pub(super) fn ldloca(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = local(ctx, instr)?;
    let lowest = slot.virtual_addresses.last().copied().unwrap_or(-(slot.offset as i32));
    ctx.asm.emit(Instr::Lea(Eax, Mem::at(Ebp, lowest)));
    ctx.asm.push(Eax);
    ctx.push(StackItem::address());
    Ok(())
}

pub(super) fn ldarg(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = arg(ctx, instr)?;
    for &addr in slot.virtual_addresses.iter().rev() {
        ctx.asm.push(Mem::at(Ebp, addr));
    }
    let this_of_value_type = ctx.info.has_this
        && local_index(instr)? == 0
        && ctx.program().ty(slot.ty)?.is_value_type();
    let item = if this_of_value_type {
        StackItem::address()
    } else {
        slot_item(ctx, slot.ty, slot.size, slot.is_reference)?
    };
    ctx.push(item);
    Ok(())
}

pub(super) fn starg(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = arg(ctx, instr)?;
    ctx.pop(instr.op)?;
    for &addr in &slot.virtual_addresses {
        ctx.asm.pop(Mem::at(Ebp, addr));
    }
    Ok(())
}

pub(super) fn ldarga(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let slot = arg(ctx, instr)?;
    let lowest = slot.virtual_addresses.first().copied().unwrap_or(8);
    ctx.asm.emit(Instr::Lea(Eax, Mem::at(Ebp, lowest)));
    ctx.asm.push(Eax);
    ctx.push(StackItem::address());
    Ok(())
}
