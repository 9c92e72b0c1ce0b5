//! Method prologue and epilogue, plug proxies and the program entry routine.

use ilaot_asm::{AluOp, Assembler, Condition, Instr, Mem, Operand, Register::*};
use ilaot_core::{CustomAssembler, MethodId, naming};

use crate::Result;
use crate::method_info::{self, MethodInfo};
use crate::session::{MethodData, Session};

/// `label:`, a fresh `ebp` frame, and one zeroed word per local word and per
/// localloc slot.
pub fn method_header(asm: &mut Assembler, info: &MethodInfo) {
    asm.label(info.label.as_str());
    if info.debug {
        for line in info.to_string().lines() {
            asm.comment(line);
        }
    }
    asm.push(Ebp);
    asm.mov(Ebp, Esp);
    for _ in 0..info.locals_size / 4 + info.localloc_count {
        asm.push(0);
    }
}

/// Clear the exception flag, move the return value into the caller's frame
/// and return. Handlers that give up jump straight to the exception exit,
/// keeping the flag set.
pub fn method_footer(asm: &mut Assembler, info: &MethodInfo) {
    asm.label(naming::end_of_method_label(&info.label));
    asm.alu(AluOp::Xor, Ecx, Ecx);
    let slot = info.return_slot();
    for word in 0..info.return_size.div_ceil(4) {
        asm.pop(Mem::at(Ebp, slot + word as i32 * 4));
    }
    asm.label(naming::exception_exit_label(&info.label));
    asm.mov(Esp, Ebp);
    asm.pop(Ebp);
    asm.emit(Instr::Ret(info.ret_pop_size() as u16));
}

/// Body of a plugged method: forward every argument to the replacement and
/// leave its return value for the footer.
pub fn plug_proxy(asm: &mut Assembler, original: &MethodInfo, replacement: &MethodInfo) {
    for arg in &original.args {
        for &addr in arg.virtual_addresses.iter().rev() {
            asm.push(Mem::at(Ebp, addr));
        }
    }
    if replacement.padding() > 0 {
        asm.alu(AluOp::Sub, Esp, replacement.padding() as i32);
    }
    asm.call(replacement.label.as_str());
    asm.emit(Instr::Test(Ecx, Operand::Imm(2)));
    asm.jcc(Condition::Ne, naming::exception_exit_label(&original.label));
}

/// Fixed body of a method carrying a custom assembler.
pub fn custom_assembler(asm: &mut Assembler, kind: CustomAssembler) {
    match kind {
        CustomAssembler::Halt => {
            asm.emit(Instr::Cli);
            asm.emit(Instr::Hlt);
        }
        CustomAssembler::DisableInterrupts => asm.emit(Instr::Cli),
        CustomAssembler::EnableInterrupts => asm.emit(Instr::Sti),
        CustomAssembler::DebugBreak => asm.emit(Instr::Int3),
    }
}

fn call_method(asm: &mut Assembler, session: &Session<'_>, method: MethodId) -> Result<MethodInfo> {
    let label = session.method_label(method)?;
    let info = method_info::resolve_method(
        session,
        method,
        method,
        &label,
        None,
        session.debug(),
        &MethodData::new(),
    )?;
    if info.padding() > 0 {
        asm.alu(AluOp::Sub, Esp, info.padding() as i32);
    }
    asm.call(label);
    Ok(info)
}

/// Boot the runtime, build the dispatch tables, run every static constructor,
/// run the program, then halt forever.
pub fn entry_point(asm: &mut Assembler, session: &Session<'_>, entry: MethodId) -> Result<()> {
    let program = session.program();
    let hooks = &program.runtime;

    asm.label(naming::ENTRY_POINT_LABEL);
    call_method(asm, session, hooks.initialize_application)?;
    asm.call(naming::INIT_VMT_LABEL);

    for ty in session.registered_types() {
        let td = program.ty(ty)?;
        for &id in &td.methods {
            if program.method(id)?.is_cctor() && session.is_method_queued(id) {
                asm.comment(format!("static constructor of {}", td.full_name()));
                call_method(asm, session, id)?;
            }
        }
    }

    let main = call_method(asm, session, entry)?;
    if main.return_size == 0 {
        asm.push(0);
    }
    call_method(asm, session, hooks.finalize_application)?;

    asm.emit(Instr::Cli);
    asm.label(naming::ENTRY_HALT_LABEL);
    asm.emit(Instr::Hlt);
    asm.jmp(naming::ENTRY_HALT_LABEL);
    Ok(())
}
