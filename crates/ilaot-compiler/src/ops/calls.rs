//! Calls and object construction.

use ilaot_asm::{AluOp, Instr, Mem, Operand, Register::*};
use ilaot_core::{Instruction, MethodId, OpCode, naming};

use super::{OpContext, StackItem, operand_method, unsupported};
use crate::Result;
use crate::invariants;
use crate::layout::{FIELD_DATA_OFFSET, INSTANCE_NORMAL, round4};
use crate::method_info::MethodInfo;
use crate::session::{MethodData, Session};
use crate::vmt;

const DEBUGGER_BREAK: &str = "System.Void System.Diagnostics.Debugger.Break()";

/// Register the declaring, parameter and return types of `method`.
fn register_signature(session: &Session<'_>, method: MethodId) -> Result<()> {
    let m = session.program().method(method)?;
    session.register_type(m.declaring)?;
    for ty in m.param_types() {
        session.register_type(ty)?;
    }
    if let Some(ret) = m.return_type {
        session.register_type(ret)?;
    }
    Ok(())
}

pub(super) fn scan_call(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let target = operand_method(instr)?;
    if session.program().method_signature(target)? == DEBUGGER_BREAK {
        return Ok(());
    }
    register_signature(session, target)?;
    session.queue_method(target)?;
    Ok(())
}

pub(super) fn call(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let target = operand_method(instr)?;
    let program = ctx.program();
    if program.method_signature(target)? == DEBUGGER_BREAK {
        if ctx.info.debug {
            ctx.asm.call(naming::DEBUG_STUB_LABEL);
        } else {
            ctx.asm.comment("Debugger.Break");
        }
        return Ok(());
    }

    let m = program.method(target)?;
    for _ in 0..m.params.len() + usize::from(m.is_instance()) {
        ctx.pop(instr.op)?;
    }

    let dispatch = instr.op == OpCode::Callvirt
        && m.is_virtual
        && !m.is_final
        && !program.ty(m.declaring)?.is_value_type();
    let callee = if dispatch {
        virtual_call(ctx, target)?
    } else {
        ctx.emit_call(target)?
    };

    let resume = ctx.next_label();
    ctx.exception_check(round4(callee.return_size), &resume);
    if let Some(ret) = m.return_type
        && callee.return_size > 0
    {
        let item = StackItem::of_type(program, &ctx.layouts(), ret)?;
        ctx.push(item);
    }
    Ok(())
}

/// Look the implementation up through the runtime and call it indirectly.
fn virtual_call(ctx: &mut OpContext<'_>, target: MethodId) -> Result<MethodInfo> {
    let program = ctx.program();
    let callee = ctx.method_info(target)?;
    let params = callee.args_size() - 4;
    let base = vmt::ultimate_base(program, target)?;
    let id = invariants::ensure_queued(ctx.session.method_ordinal(base), base);

    ctx.asm.mov(Eax, Mem::at(Esp, params as i32));
    ctx.asm.push(Mem::at(Eax, 0));
    ctx.asm.push(id as i32);
    ctx.emit_call(program.runtime.get_method_address_for_type)?;
    ctx.asm.pop(Eax);
    if callee.padding() > 0 {
        ctx.asm.alu(AluOp::Sub, Esp, callee.padding() as i32);
    }
    ctx.asm.emit(Instr::Call(Eax.into()));
    Ok(callee)
}

pub(super) fn scan_newobj(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let ctor = operand_method(instr)?;
    register_signature(session, ctor)?;
    session.queue_method(ctor)?;
    Ok(())
}

/// Allocate, tag the header, then run the constructor on a copy of the
/// arguments with the new object as `this`.
pub(super) fn newobj(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ctor = operand_method(instr)?;
    let program = ctx.program();
    let m = program.method(ctor)?;
    if program.ty(m.declaring)?.is_value_type() {
        return Err(unsupported(instr, "value type construction with newobj"));
    }

    let mut param_bytes = 0;
    for _ in &m.params {
        param_bytes += ctx.pop(instr.op)?.bytes();
    }
    let layout = ctx.layouts().resolve_fields(m.declaring)?;
    let type_id = ctx.session.register_type(m.declaring)?;

    ctx.asm.push((FIELD_DATA_OFFSET + layout.storage_size) as i32);
    ctx.emit_call(program.runtime.alloc_new_object)?;
    ctx.exception_check_inline(4 + param_bytes);
    ctx.asm.pop(Eax);
    ctx.asm.mov(Mem::at(Eax, 0), type_id as i32);
    ctx.asm.mov(Mem::at(Eax, 4), INSTANCE_NORMAL);

    ctx.asm.push(Eax);
    ctx.asm.push(Eax);
    // every push moves esp, so the next lower word stays at the same offset
    for _ in 0..param_bytes / 4 {
        ctx.asm.push(Mem::at(Esp, param_bytes as i32 + 4));
    }
    ctx.emit_call(ctor)?;
    ctx.exception_check_inline(4 + param_bytes);

    ctx.asm.pop(Eax);
    if param_bytes > 0 {
        ctx.asm.alu(AluOp::Add, Esp, param_bytes as i32);
    }
    ctx.asm.push(Eax);
    ctx.push(StackItem::reference());
    Ok(())
}

pub(super) fn scan_ldftn(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let target = operand_method(instr)?;
    register_signature(session, target)?;
    session.queue_method(target)?;
    Ok(())
}

pub(super) fn ldftn(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let target = operand_method(instr)?;
    ctx.asm.push(Operand::addr(ctx.session.method_label(target)?));
    ctx.push(StackItem::reference());
    Ok(())
}
