use ilaot_asm::{AluOp, Instr, Mem, Register::*, Width};
use ilaot_core::{Instruction, OpCode};

use super::{OpContext, StackItem, unsupported};
use crate::Result;

/// Integer conversions. Wide sources are truncated to their low word first.
pub(super) fn conv(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let source = ctx.pop(instr.op)?;
    if source.is_float {
        return Err(unsupported(instr, "floating point conversion"));
    }
    if source.bytes() > 8 {
        return Err(unsupported(instr, "operand wider than 64 bits"));
    }
    let wide_source = source.bytes() == 8;

    match instr.op {
        OpCode::ConvI8 | OpCode::ConvU8 => {
            if !wide_source {
                ctx.asm.pop(Eax);
                if instr.op == OpCode::ConvI8 {
                    ctx.asm.emit(Instr::Cdq);
                } else {
                    ctx.asm.alu(AluOp::Xor, Edx, Edx);
                }
                ctx.asm.push(Edx);
                ctx.asm.push(Eax);
            }
            ctx.push(StackItem::value(8));
            return Ok(());
        }
        _ => {}
    }

    if wide_source {
        ctx.asm.pop(Eax);
        ctx.asm.mov(Mem::at(Esp, 0), Eax);
    }
    let narrow = match instr.op {
        OpCode::ConvI1 => Some((Width::Byte, true)),
        OpCode::ConvU1 => Some((Width::Byte, false)),
        OpCode::ConvI2 => Some((Width::Word, true)),
        OpCode::ConvU2 => Some((Width::Word, false)),
        _ => None,
    };
    if let Some((width, signed)) = narrow {
        let src = Mem::at(Esp, 0).into();
        ctx.asm.emit(if signed {
            Instr::Movsx {
                dst: Eax,
                src,
                width,
            }
        } else {
            Instr::Movzx {
                dst: Eax,
                src,
                width,
            }
        });
        ctx.asm.mov(Mem::at(Esp, 0), Eax);
    }
    ctx.push(StackItem::value(4));
    Ok(())
}
