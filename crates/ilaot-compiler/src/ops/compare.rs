use ilaot_asm::{AluOp, Assembler, Condition, Instr, Mem, Register::*, Width};
use ilaot_core::{Instruction, OpCode};

use super::{OpContext, StackItem, unsupported};
use crate::Result;

/// How 64-bit operands are combined to set the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum WideFlags {
    /// `ZF` set when equal.
    Equality,
    /// Flags of `lhs - rhs`.
    LhsMinusRhs,
    /// Flags of `rhs - lhs`.
    RhsMinusLhs,
}

/// Pop both operands' words into place and compare them. Afterwards the
/// left operand still occupies `[esp]` and `[esp + 4]`.
pub(super) fn wide_flags(asm: &mut Assembler, flags: WideFlags) {
    asm.pop(Eax);
    asm.pop(Edx);
    match flags {
        WideFlags::Equality => {
            asm.alu(AluOp::Xor, Eax, Mem::at(Esp, 0));
            asm.alu(AluOp::Xor, Edx, Mem::at(Esp, 4));
            asm.alu(AluOp::Or, Eax, Edx);
        }
        WideFlags::LhsMinusRhs => {
            asm.mov(Ecx, Mem::at(Esp, 0));
            asm.alu(AluOp::Sub, Ecx, Eax);
            asm.mov(Ecx, Mem::at(Esp, 4));
            asm.alu(AluOp::Sbb, Ecx, Edx);
        }
        WideFlags::RhsMinusLhs => {
            asm.alu(AluOp::Sub, Eax, Mem::at(Esp, 0));
            asm.alu(AluOp::Sbb, Edx, Mem::at(Esp, 4));
        }
    }
}

/// Pop two comparable operands. Returns `true` for 64-bit pairs.
pub(super) fn comparable(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<bool> {
    let rhs = ctx.pop(instr.op)?;
    let lhs = ctx.pop(instr.op)?;
    if lhs.is_float || rhs.is_float {
        return Err(unsupported(instr, "floating point comparison"));
    }
    match (lhs.bytes(), rhs.bytes()) {
        (4, 4) => Ok(false),
        (8, 8) => Ok(true),
        _ => Err(unsupported(instr, "operands of different widths")),
    }
}

/// `ceq`, `cgt`, `cgt.un`, `clt`, `clt.un`: push 1 or 0.
pub(super) fn compare(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let wide = comparable(ctx, instr)?;
    let cond = match instr.op {
        OpCode::Ceq => Condition::E,
        OpCode::Cgt => Condition::G,
        OpCode::CgtUn => Condition::A,
        OpCode::Clt => Condition::L,
        _ => Condition::B,
    };

    if wide {
        // a > b is b < a
        let (flags, cond) = match instr.op {
            OpCode::Ceq => (WideFlags::Equality, Condition::E),
            OpCode::Cgt => (WideFlags::RhsMinusLhs, Condition::L),
            OpCode::CgtUn => (WideFlags::RhsMinusLhs, Condition::B),
            _ => (WideFlags::LhsMinusRhs, cond),
        };
        wide_flags(ctx.asm, flags);
        set_bool(ctx.asm, cond);
        ctx.asm.alu(AluOp::Add, Esp, 8);
    } else {
        ctx.asm.pop(Eax);
        ctx.asm.pop(Edx);
        ctx.asm.alu(AluOp::Cmp, Edx, Eax);
        set_bool(ctx.asm, cond);
    }
    ctx.asm.push(Eax);
    ctx.push(StackItem::value(4));
    Ok(())
}

fn set_bool(asm: &mut Assembler, cond: Condition) {
    asm.emit(Instr::Setcc(cond, Eax));
    asm.emit(Instr::Movzx {
        dst: Eax,
        src: Eax.into(),
        width: Width::Byte,
    });
}
