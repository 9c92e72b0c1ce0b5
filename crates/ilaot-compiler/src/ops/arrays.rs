//! Single-dimensional arrays.

use ilaot_asm::{AluOp, Instr, Mem, Register::*};
use ilaot_core::{Instruction, OpCode, Operand as IlOperand, image::ARRAY_TYPE};

use super::{OpContext, StackItem, emit_load, emit_store, operand_type};
use crate::Result;
use crate::layout::{
    ARRAY_COUNT_OFFSET, ARRAY_DATA_OFFSET, ARRAY_ELEMENT_SIZE_OFFSET, INSTANCE_ARRAY, is_signed,
};
use crate::method_info::MethodInfo;
use crate::session::{MethodData, Session};

pub(super) fn scan_newarr(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let array = session.program().require_type(ARRAY_TYPE)?;
    session.register_type(array)?;
    session.register_type(operand_type(instr)?)?;
    Ok(())
}

pub(super) fn scan_typed_element(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    if let IlOperand::Type(ty) = instr.operand {
        session.register_type(ty)?;
    }
    Ok(())
}

/// Element size and stack item implied by a typed element opcode.
fn element(ctx: &OpContext<'_>, instr: &Instruction) -> Result<(u32, bool, StackItem)> {
    use OpCode::*;

    Ok(match instr.op {
        LdelemI1 | StelemI1 => (1, true, StackItem::value(4)),
        LdelemU1 => (1, false, StackItem::value(4)),
        LdelemI2 | StelemI2 => (2, true, StackItem::value(4)),
        LdelemU2 => (2, false, StackItem::value(4)),
        LdelemI4 | LdelemU4 | LdelemI | StelemI4 | StelemI => (4, false, StackItem::value(4)),
        LdelemI8 | StelemI8 => (8, false, StackItem::value(8)),
        LdelemR4 | StelemR4 => (4, false, StackItem::float(4)),
        LdelemR8 | StelemR8 => (8, false, StackItem::float(8)),
        LdelemRef | StelemRef => (4, false, StackItem::reference()),
        _ => {
            let ty = operand_type(instr)?;
            let program = ctx.program();
            let item = StackItem::of_type(program, &ctx.layouts(), ty)?;
            (item.size, is_signed(&program.type_name(ty)?), item)
        }
    })
}

pub(super) fn newarr(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let program = ctx.program();
    ctx.pop(instr.op)?;
    let size = ctx.layouts().storage_size(ty)?;
    let type_id = ctx.session.register_type(program.require_type(ARRAY_TYPE)?)?;

    ctx.asm.mov(Eax, Mem::at(Esp, 0));
    ctx.asm.emit(Instr::ImulImm(Eax, Eax.into(), size as i32));
    ctx.asm.alu(AluOp::Add, Eax, ARRAY_DATA_OFFSET as i32);
    ctx.asm.push(Eax);
    ctx.emit_call(program.runtime.alloc_new_object)?;
    ctx.exception_check_inline(8);
    ctx.asm.pop(Eax);
    ctx.asm.pop(Edx);
    ctx.asm.mov(Mem::at(Eax, 0), type_id as i32);
    ctx.asm.mov(Mem::at(Eax, 4), INSTANCE_ARRAY);
    ctx.asm.mov(Mem::at(Eax, ARRAY_COUNT_OFFSET as i32), Edx);
    ctx.asm.mov(Mem::at(Eax, ARRAY_ELEMENT_SIZE_OFFSET as i32), size as i32);
    ctx.asm.push(Eax);
    ctx.push(StackItem::reference());
    Ok(())
}

pub(super) fn ldlen(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    ctx.pop(instr.op)?;
    ctx.asm.pop(Eax);
    ctx.asm.push(Mem::at(Eax, ARRAY_COUNT_OFFSET as i32));
    ctx.push(StackItem::value(4));
    Ok(())
}

/// Pop index and array, leaving the element base address in `eax`.
fn element_address(ctx: &mut OpContext<'_>, instr: &Instruction, size: u32) -> Result<()> {
    ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;
    ctx.asm.pop(Eax);
    ctx.asm.emit(Instr::ImulImm(Eax, Eax.into(), size as i32));
    ctx.asm.pop(Edx);
    ctx.asm.alu(AluOp::Add, Eax, Edx);
    Ok(())
}

pub(super) fn ldelema(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let size = ctx.layouts().storage_size(operand_type(instr)?)?;
    element_address(ctx, instr, size)?;
    ctx.asm.emit(Instr::Lea(Eax, Mem::at(Eax, ARRAY_DATA_OFFSET as i32)));
    ctx.asm.push(Eax);
    ctx.push(StackItem::address());
    Ok(())
}

pub(super) fn ldelem(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (size, signed, item) = element(ctx, instr)?;
    element_address(ctx, instr, size)?;
    emit_load(ctx.asm, Mem::at(Eax, ARRAY_DATA_OFFSET as i32), size, signed);
    ctx.push(item);
    Ok(())
}

pub(super) fn stelem(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (size, _, _) = element(ctx, instr)?;
    let value = ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;

    let above = value.bytes() as i32;
    ctx.asm.mov(Eax, Mem::at(Esp, above));
    ctx.asm.emit(Instr::ImulImm(Eax, Eax.into(), size as i32));
    ctx.asm.alu(AluOp::Add, Eax, Mem::at(Esp, above + 4));
    emit_store(ctx.asm, Mem::at(Eax, ARRAY_DATA_OFFSET as i32), size);
    ctx.asm.alu(AluOp::Add, Esp, 8);
    Ok(())
}
