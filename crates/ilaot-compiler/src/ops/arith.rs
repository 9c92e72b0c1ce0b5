use ilaot_asm::{AluOp, Instr, Mem, Register::*, ShiftCount, ShiftOp, UnaryOp};
use ilaot_core::{Instruction, OpCode};

use super::{OpContext, StackItem, unsupported};
use crate::Result;

fn operands(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<(StackItem, StackItem)> {
    let rhs = ctx.pop(instr.op)?;
    let lhs = ctx.pop(instr.op)?;
    if lhs.is_float || rhs.is_float {
        return Err(unsupported(instr, "floating point arithmetic"));
    }
    Ok((lhs, rhs))
}

fn require_word(instr: &Instruction, items: &[StackItem]) -> Result<()> {
    if items.iter().any(|item| item.bytes() > 4) {
        return Err(unsupported(instr, "64-bit operands"));
    }
    Ok(())
}

/// `add`, `sub`, `and`, `or`, `xor` on one or two words.
pub(super) fn binary(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (lhs, rhs) = operands(ctx, instr)?;
    let (low, high) = match instr.op {
        OpCode::Add => (AluOp::Add, AluOp::Adc),
        OpCode::Sub => (AluOp::Sub, AluOp::Sbb),
        OpCode::And => (AluOp::And, AluOp::And),
        OpCode::Or => (AluOp::Or, AluOp::Or),
        _ => (AluOp::Xor, AluOp::Xor),
    };
    let wide = lhs.bytes() == 8 || rhs.bytes() == 8;
    if wide && (lhs.bytes() != 8 || rhs.bytes() != 8) {
        return Err(unsupported(instr, "mixed 32-bit and 64-bit operands"));
    }
    if lhs.bytes() > 8 {
        return Err(unsupported(instr, "operands wider than 64 bits"));
    }

    ctx.asm.pop(Eax);
    if wide {
        ctx.asm.pop(Edx);
        ctx.asm.alu(low, Mem::at(Esp, 0), Eax);
        ctx.asm.alu(high, Mem::at(Esp, 4), Edx);
    } else {
        ctx.asm.alu(low, Mem::at(Esp, 0), Eax);
    }
    ctx.push(StackItem::value(lhs.bytes()));
    Ok(())
}

pub(super) fn mul(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (lhs, rhs) = operands(ctx, instr)?;
    require_word(instr, &[lhs, rhs])?;
    ctx.asm.pop(Eax);
    ctx.asm.emit(Instr::Imul(Eax, Mem::at(Esp, 0).into()));
    ctx.asm.mov(Mem::at(Esp, 0), Eax);
    ctx.push(StackItem::value(4));
    Ok(())
}

/// `div`, `div.un`, `rem`, `rem.un`: quotient in `eax`, remainder in `edx`.
pub(super) fn divide(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (lhs, rhs) = operands(ctx, instr)?;
    require_word(instr, &[lhs, rhs])?;
    let signed = matches!(instr.op, OpCode::Div | OpCode::Rem);
    ctx.asm.pop(Ecx);
    ctx.asm.pop(Eax);
    if signed {
        ctx.asm.emit(Instr::Cdq);
        ctx.asm.emit(Instr::Unary(UnaryOp::Idiv, Ecx.into()));
    } else {
        ctx.asm.alu(AluOp::Xor, Edx, Edx);
        ctx.asm.emit(Instr::Unary(UnaryOp::Div, Ecx.into()));
    }
    match instr.op {
        OpCode::Rem | OpCode::RemUn => ctx.asm.push(Edx),
        _ => ctx.asm.push(Eax),
    }
    ctx.push(StackItem::value(4));
    Ok(())
}

pub(super) fn shift(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let (value, amount) = operands(ctx, instr)?;
    require_word(instr, &[value, amount])?;
    let op = match instr.op {
        OpCode::Shl => ShiftOp::Shl,
        OpCode::Shr => ShiftOp::Sar,
        _ => ShiftOp::Shr,
    };
    ctx.asm.pop(Ecx);
    ctx.asm.pop(Eax);
    ctx.asm.emit(Instr::Shift(op, Eax, ShiftCount::Cl));
    ctx.asm.push(Eax);
    ctx.push(StackItem::value(4));
    Ok(())
}

/// `neg`, `not` in place on the top word.
pub(super) fn unary(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let item = ctx.pop(instr.op)?;
    if item.is_float {
        return Err(unsupported(instr, "floating point arithmetic"));
    }
    require_word(instr, &[item])?;
    let op = if instr.op == OpCode::Neg {
        UnaryOp::Neg
    } else {
        UnaryOp::Not
    };
    ctx.asm.emit(Instr::Unary(op, Mem::at(Esp, 0).into()));
    ctx.push(StackItem::value(4));
    Ok(())
}
