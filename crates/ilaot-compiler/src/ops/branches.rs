//! Control flow: branches, `switch`, `throw`, `ret`.
//!
//! `leave` is a plain jump; finally blocks only run on the exception path.

use ilaot_asm::{AluOp, Condition, Instr, Mem, Operand, Register::*};
use ilaot_core::{Instruction, OpCode, Operand as IlOperand, naming};

use super::compare::{WideFlags, comparable, wide_flags};
use super::{OpContext, missing, operand_target};
use crate::Result;

pub(super) fn br(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let target = ctx.branch_target(operand_target(instr)?);
    ctx.asm.jmp(target);
    Ok(())
}

pub(super) fn br_bool(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let item = ctx.pop(instr.op)?;
    if item.bytes() == 8 {
        ctx.asm.pop(Eax);
        ctx.asm.pop(Edx);
        ctx.asm.alu(AluOp::Or, Eax, Edx);
    } else {
        ctx.asm.pop(Eax);
        ctx.asm.emit(Instr::Test(Eax, Eax.into()));
    }
    let cond = match instr.op {
        OpCode::Brtrue | OpCode::BrtrueS => Condition::Ne,
        _ => Condition::E,
    };
    let target = ctx.branch_target(operand_target(instr)?);
    ctx.asm.jcc(cond, target);
    Ok(())
}

pub(super) fn br_compare(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    use OpCode::*;

    let wide = comparable(ctx, instr)?;
    let cond = match instr.op {
        Beq | BeqS => Condition::E,
        BneUn | BneUnS => Condition::Ne,
        Bge | BgeS => Condition::Ge,
        BgeUn | BgeUnS => Condition::Ae,
        Bgt | BgtS => Condition::G,
        BgtUn | BgtUnS => Condition::A,
        Ble | BleS => Condition::Le,
        BleUn | BleUnS => Condition::Be,
        Blt | BltS => Condition::L,
        _ => Condition::B,
    };

    if wide {
        // a > b is b < a, a <= b is b >= a
        let (flags, cond) = match cond {
            Condition::E | Condition::Ne => (WideFlags::Equality, cond),
            Condition::G => (WideFlags::RhsMinusLhs, Condition::L),
            Condition::A => (WideFlags::RhsMinusLhs, Condition::B),
            Condition::Le => (WideFlags::RhsMinusLhs, Condition::Ge),
            Condition::Be => (WideFlags::RhsMinusLhs, Condition::Ae),
            _ => (WideFlags::LhsMinusRhs, cond),
        };
        wide_flags(ctx.asm, flags);
        // lea leaves the flags alone
        ctx.asm.emit(Instr::Lea(Esp, Mem::at(Esp, 8)));
        let target = ctx.branch_target(operand_target(instr)?);
        ctx.asm.jcc(cond, target);
    } else {
        ctx.asm.pop(Eax);
        ctx.asm.pop(Edx);
        ctx.asm.alu(AluOp::Cmp, Edx, Eax);
        let target = ctx.branch_target(operand_target(instr)?);
        ctx.asm.jcc(cond, target);
    }
    Ok(())
}

pub(super) fn switch(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let IlOperand::Switch(targets) = &instr.operand else {
        return Err(missing(instr));
    };
    ctx.pop(instr.op)?;
    ctx.asm.pop(Eax);
    for (i, &target) in targets.iter().enumerate() {
        ctx.asm.alu(AluOp::Cmp, Eax, i as i32);
        let label = ctx.branch_target(target);
        ctx.asm.jcc(Condition::E, label);
    }
    Ok(())
}

/// Store the exception object, raise the flag and leave for the handler.
pub(super) fn throw(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    ctx.pop(instr.op)?;
    ctx.asm.pop(Mem::label(naming::CURRENT_EXCEPTION_LABEL, 0));
    ctx.asm.mov(Ecx, Operand::Imm(2));
    let target = ctx.exception_target();
    ctx.asm.jmp(target);
    Ok(())
}

pub(super) fn ret(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    if ctx.info.return_size > 0 {
        ctx.pop(instr.op)?;
    }
    ctx.asm.jmp(naming::end_of_method_label(&ctx.info.label));
    Ok(())
}
