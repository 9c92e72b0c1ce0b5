//! Code generation over a frozen session.

use ilaot_asm::{Assembler, DataMember, DebugSymbol, Instr, Mem, Register::*};
use ilaot_core::{Interner, MethodBody, MethodDef, MethodId, OpCode, naming};

use crate::Result;
use crate::layout::round4;
use crate::method_info::{self, MethodInfo};
use crate::ops::{OpCodeMap, OpContext, StackItem, frame};
use crate::regions;
use crate::session::{MethodData, Session};

/// `(current, total)` progress observer.
pub(crate) type Progress<'a> = &'a dyn Fn(usize, usize);

pub(crate) struct CodeGen<'s, 'p> {
    session: &'s Session<'p>,
    map: &'s OpCodeMap,
    asm: Assembler,
    strings: Interner,
    symbols: Vec<DebugSymbol>,
}

impl<'s, 'p> CodeGen<'s, 'p> {
    pub fn new(session: &'s Session<'p>, map: &'s OpCodeMap) -> Self {
        Self {
            session,
            map,
            asm: Assembler::new(),
            strings: Interner::new(),
            symbols: Vec::new(),
        }
    }

    /// Entry routine, VMT initializer, every queued method, then the static
    /// field storage and fixed data.
    pub fn emit_program(
        mut self,
        entry: MethodId,
        on_methods: Progress<'_>,
        on_static_fields: Progress<'_>,
    ) -> Result<(Assembler, Vec<DebugSymbol>)> {
        (self.map.entry)(&mut self.asm, self.session, entry)?;

        let init_vmt = MethodInfo::synthetic(naming::INIT_VMT_LABEL);
        (self.map.header)(&mut self.asm, &init_vmt);
        (self.map.init_vmt)(&mut self.asm, self.session)?;
        (self.map.footer)(&mut self.asm, &init_vmt);

        let methods = self.session.method_ids();
        on_methods(0, methods.len());
        for (i, &id) in methods.iter().enumerate() {
            self.emit_method(id)?;
            on_methods(i + 1, methods.len());
        }

        self.emit_static_fields(on_static_fields)?;
        self.asm.add_data(DataMember::zeroed(naming::CURRENT_EXCEPTION_LABEL, 4));

        if self.session.debug() {
            self.asm.label(naming::DEBUG_STUB_LABEL);
            self.asm.emit(Instr::Int3);
            self.asm.emit(Instr::Ret(0));
        }
        Ok((self.asm, self.symbols))
    }

    fn emit_static_fields(&mut self, progress: Progress<'_>) -> Result<()> {
        let program = self.session.program();
        let layouts = self.session.layouts();
        let fields = self.session.static_fields();
        progress(0, fields.len());
        for (i, (id, label)) in fields.iter().enumerate() {
            let size = layouts.storage_size(program.field(*id)?.field_type)?;
            self.asm.add_data(DataMember::zeroed(label.as_str(), round4(size).max(4)));
            progress(i + 1, fields.len());
        }
        Ok(())
    }

    fn emit_method(&mut self, id: MethodId) -> Result<()> {
        let program = self.session.program();
        let method = program.method(id)?;
        if method.is_abstract {
            self.session.mark_processed(id);
            return Ok(());
        }

        let label = self.session.method_label(id)?;
        tracing::debug!(method = %label, "emitting");
        let type_info = if method.is_instance() {
            Some(self.session.layouts().resolve_fields(method.declaring)?)
        } else {
            None
        };
        let data = self.session.method_data(id);
        let info = method_info::resolve_method(
            self.session,
            id,
            id,
            &label,
            type_info,
            self.session.debug(),
            &data,
        )?;

        (self.map.header)(&mut self.asm, &info);
        if let Some(replacement) = self.session.method_plug(id) {
            let target = method_info::resolve_method(
                self.session,
                replacement,
                replacement,
                &self.session.method_label(replacement)?,
                None,
                self.session.debug(),
                &MethodData::new(),
            )?;
            (self.map.proxy)(&mut self.asm, &info, &target);
        } else if let Some(custom) = self
            .map
            .custom_implementation(&program.method_signature(id)?)
        {
            custom(&mut self.asm);
        } else if let Some(kind) = method.custom_assembler {
            frame::custom_assembler(&mut self.asm, kind);
        } else if let Some(body) = &method.body {
            self.emit_body(method, &info, &data, body)?;
        } else {
            tracing::warn!(method = %label, "no body to compile, emitting an empty frame");
            self.asm
                .comment(format!("{:?} method without a body", method.implementation));
        }
        (self.map.footer)(&mut self.asm, &info);
        self.session.mark_processed(id);
        Ok(())
    }

    fn emit_body(
        &mut self,
        method: &MethodDef,
        info: &MethodInfo,
        data: &MethodData,
        body: &MethodBody,
    ) -> Result<()> {
        let program = self.session.program();
        let type_token = program.ty(method.declaring)?.token;
        let collect_symbols = info.debug && !method.non_debuggable;
        let frame_size = (info.locals_size + info.localloc_count * 4) as i32;

        let mut ctx = OpContext::new(
            self.session,
            &mut self.asm,
            &mut self.strings,
            info,
            data,
            body,
        );
        let mut falls_through = true;
        for (index, instr) in body.instructions.iter().enumerate() {
            ctx.enter(index, falls_through);
            let label = ctx.label();
            ctx.asm.label(label.as_str());

            // handlers start on an empty operand stack
            if body.handlers.iter().any(|h| h.handler_start == instr.offset)
                || regions::receives_exception(&body.handlers, instr.offset)
            {
                ctx.stack.clear();
                ctx.asm.emit(Instr::Lea(Esp, Mem::at(Ebp, -frame_size)));
                if regions::receives_exception(&body.handlers, instr.offset) {
                    ctx.asm.push(Mem::label(naming::CURRENT_EXCEPTION_LABEL, 0));
                    ctx.push(StackItem::reference());
                }
            }

            if collect_symbols {
                self.symbols.push(DebugSymbol {
                    instruction_label: label,
                    method_label: info.label.clone(),
                    il_offset: instr.offset,
                    stack_depth: info.locals_size / 4 + ctx.stack.depth_words(),
                    method_token: method.token,
                    type_token,
                });
            }
            if info.debug {
                ctx.asm.comment(instr.op.as_str());
            }
            tracing::trace!(method = %info.label, offset = instr.offset, op = %instr.op, "assemble");

            let entry = self.map.handler(instr.op)?;
            (entry.assemble)(&mut ctx, instr)?;
            falls_through = !matches!(
                instr.op,
                OpCode::Br
                    | OpCode::BrS
                    | OpCode::Leave
                    | OpCode::LeaveS
                    | OpCode::Ret
                    | OpCode::Throw
                    | OpCode::Endfinally
            );
        }
        Ok(())
    }
}
