//! Loads and stores through addresses, and `localloc`.

use ilaot_asm::{AluOp, Mem, Register::*};
use ilaot_core::{Instruction, OpCode};

use super::{OpContext, StackItem, emit_load, emit_store, unsupported};
use crate::method_info::{LOCALLOC_COUNT_KEY, MethodInfo, localloc_item_key};
use crate::session::{MethodData, Session};
use crate::{Error, Result};

pub(super) fn ldind(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    use OpCode::*;

    let (size, signed, item) = match instr.op {
        LdindI1 => (1, true, StackItem::value(4)),
        LdindU1 => (1, false, StackItem::value(4)),
        LdindI2 => (2, true, StackItem::value(4)),
        LdindU2 => (2, false, StackItem::value(4)),
        LdindI8 => (8, false, StackItem::value(8)),
        LdindR4 => (4, false, StackItem::float(4)),
        LdindR8 => (8, false, StackItem::float(8)),
        LdindRef => (4, false, StackItem::reference()),
        _ => (4, false, StackItem::value(4)),
    };
    ctx.pop(instr.op)?;
    ctx.asm.pop(Eax);
    emit_load(ctx.asm, Mem::at(Eax, 0), size, signed);
    ctx.push(item);
    Ok(())
}

pub(super) fn stind(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    use OpCode::*;

    let size = match instr.op {
        StindI1 => 1,
        StindI2 => 2,
        StindI8 | StindR8 => 8,
        _ => 4,
    };
    let value = ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;
    ctx.asm.mov(Ecx, Mem::at(Esp, value.bytes() as i32));
    emit_store(ctx.asm, Mem::at(Ecx, 0), size);
    ctx.asm.alu(AluOp::Add, Esp, 4);
    Ok(())
}

/// Number this allocation site and make sure the heap allocator is compiled.
pub(super) fn scan_localloc(
    session: &Session<'_>,
    instr: &Instruction,
    info: &MethodInfo,
    data: &mut MethodData,
) -> Result<()> {
    let key = localloc_item_key(instr.offset);
    if data.contains_key(&key) {
        return Err(Error::DuplicateScan {
            method: info.label.clone(),
            key,
        });
    }
    let count = data.get(LOCALLOC_COUNT_KEY).copied().unwrap_or(0) + 1;
    data.insert(LOCALLOC_COUNT_KEY.to_owned(), count);
    data.insert(key, count);
    session.queue_method(session.program().runtime.heap_alloc)?;
    Ok(())
}

/// Allocate from the heap and remember the block in the site's frame slot.
pub(super) fn localloc(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let key = localloc_item_key(instr.offset);
    let item = ctx
        .data
        .get(&key)
        .copied()
        .ok_or_else(|| unsupported(instr, format!("allocation site `{key}` was never scanned")))?;
    ctx.pop(instr.op)?;

    let heap_alloc = ctx.program().runtime.heap_alloc;
    ctx.emit_call(heap_alloc)?;
    ctx.exception_check_inline(4);
    let slot = ctx.info.localloc_slot(item as u32);
    ctx.asm.pop(Eax);
    ctx.asm.mov(Mem::at(Ebp, slot), Eax);
    ctx.asm.push(Eax);
    ctx.push(StackItem::address());
    Ok(())
}
