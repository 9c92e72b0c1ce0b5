//! Per-method state shared by the assemble steps.

use indexmap::IndexMap;

use ilaot_asm::{AluOp, Assembler, Condition, Instr, Operand, Register::*};
use ilaot_core::{Instruction, Interner, MethodBody, MethodId, OpCode, Program, naming};

use super::stack::{StackItem, StackModel};
use crate::layout::Layouts;
use crate::method_info::{self, MethodInfo};
use crate::regions;
use crate::session::{MethodData, Session};
use crate::{Error, Result};

pub struct OpContext<'a> {
    pub session: &'a Session<'a>,
    pub asm: &'a mut Assembler,
    pub strings: &'a mut Interner,
    pub info: &'a MethodInfo,
    pub data: &'a MethodData,
    pub stack: StackModel,
    body: &'a MethodBody,
    index: usize,
    /// Stack state recorded by the first branch to each target offset.
    targets: IndexMap<u32, StackModel>,
    fresh: u32,
}

impl<'a> OpContext<'a> {
    pub fn new(
        session: &'a Session<'a>,
        asm: &'a mut Assembler,
        strings: &'a mut Interner,
        info: &'a MethodInfo,
        data: &'a MethodData,
        body: &'a MethodBody,
    ) -> Self {
        Self {
            session,
            asm,
            strings,
            info,
            data,
            stack: StackModel::default(),
            body,
            index: 0,
            targets: IndexMap::new(),
            fresh: 0,
        }
    }

    pub fn program(&self) -> &'a Program {
        self.session.program()
    }

    pub fn layouts(&self) -> Layouts<'a> {
        self.session.layouts()
    }

    /// Move to instruction `index`. After an instruction that cannot fall
    /// through, the stack is whatever the branches into this offset left.
    pub fn enter(&mut self, index: usize, reachable_by_fallthrough: bool) {
        self.index = index;
        if !reachable_by_fallthrough {
            let offset = self.offset();
            self.stack = self.targets.get(&offset).cloned().unwrap_or_default();
        }
    }

    pub fn instruction(&self) -> &'a Instruction {
        &self.body.instructions[self.index]
    }

    pub fn offset(&self) -> u32 {
        self.instruction().offset
    }

    pub fn label(&self) -> String {
        self.label_at(self.offset())
    }

    pub fn label_at(&self, offset: u32) -> String {
        naming::instruction_label(&self.info.label, offset)
    }

    /// Label of the following instruction, or the method exit after the last.
    pub fn next_label(&self) -> String {
        match self.body.instructions.get(self.index + 1) {
            Some(next) => self.label_at(next.offset),
            None => naming::end_of_method_label(&self.info.label),
        }
    }

    pub fn fresh_label(&mut self, tag: &str) -> String {
        self.fresh += 1;
        format!("{}.{tag}{}", self.label(), self.fresh)
    }

    pub fn pop(&mut self, op: OpCode) -> Result<StackItem> {
        self.stack.pop().ok_or_else(|| Error::StackUnderflow {
            op,
            method: self.info.label.clone(),
        })
    }

    pub fn push(&mut self, item: StackItem) {
        self.stack.push(item);
    }

    /// Label of a branch target, recording the current stack for it.
    pub fn branch_target(&mut self, offset: u32) -> String {
        self.targets
            .entry(offset)
            .or_insert_with(|| self.stack.clone());
        self.label_at(offset)
    }

    pub fn exception_target(&self) -> String {
        regions::exception_target(&self.info.label, &self.body.handlers, self.offset())
    }

    /// Continue at `resume` unless the exception flag is set; otherwise drop
    /// `cleanup` bytes and leave for the active handler.
    pub fn exception_check(&mut self, cleanup: u32, resume: &str) {
        self.asm.emit(Instr::Test(Ecx, Operand::Imm(2)));
        self.asm.jcc(Condition::E, resume);
        if cleanup > 0 {
            self.asm.alu(AluOp::Add, Esp, cleanup as i32);
        }
        let target = self.exception_target();
        self.asm.jmp(target);
    }

    /// [`exception_check`](Self::exception_check) resuming right after itself.
    pub fn exception_check_inline(&mut self, cleanup: u32) {
        let resume = self.fresh_label("ok");
        self.exception_check(cleanup, &resume);
        self.asm.label(resume);
    }

    pub fn method_info(&self, method: MethodId) -> Result<MethodInfo> {
        let label = self.session.method_label(method)?;
        method_info::resolve_method(
            self.session,
            method,
            method,
            &label,
            None,
            self.info.debug,
            &MethodData::new(),
        )
    }

    /// Reserve the callee's padding and call it. Arguments must already be
    /// pushed; the return value is left on the stack.
    pub fn emit_call(&mut self, method: MethodId) -> Result<MethodInfo> {
        let callee = self.method_info(method)?;
        if callee.padding() > 0 {
            self.asm.alu(AluOp::Sub, Esp, callee.padding() as i32);
        }
        self.asm.call(callee.label.as_str());
        Ok(callee)
    }
}
