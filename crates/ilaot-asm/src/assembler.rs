//! Code and data buffer the generators write into.

use indexmap::IndexMap;

use crate::instruction::{AluOp, DataMember, Instr, Item, Operand};
use crate::register::Condition;

/// Append-only code group plus a name-keyed data group.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<Item>,
    data: IndexMap<String, DataMember>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.code.push(Item::Label(name.into()));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.code.push(Item::Comment(text.into()));
    }

    pub fn emit(&mut self, instr: Instr) {
        self.code.push(Item::Instr(instr));
    }

    pub fn push(&mut self, op: impl Into<Operand>) {
        self.emit(Instr::Push(op.into()));
    }

    pub fn pop(&mut self, op: impl Into<Operand>) {
        self.emit(Instr::Pop(op.into()));
    }

    pub fn mov(&mut self, dst: impl Into<Operand>, src: impl Into<Operand>) {
        self.emit(Instr::Mov(dst.into(), src.into()));
    }

    pub fn alu(&mut self, op: AluOp, dst: impl Into<Operand>, src: impl Into<Operand>) {
        self.emit(Instr::Alu(op, dst.into(), src.into()));
    }

    pub fn call(&mut self, label: impl Into<String>) {
        self.emit(Instr::Call(Operand::Addr(label.into())));
    }

    pub fn jmp(&mut self, label: impl Into<String>) {
        self.emit(Instr::Jmp(label.into()));
    }

    pub fn jcc(&mut self, cond: Condition, label: impl Into<String>) {
        self.emit(Instr::Jcc(cond, label.into()));
    }

    /// Add a data member. The first member registered under a name wins;
    /// returns `false` when the name was already taken.
    pub fn add_data(&mut self, member: DataMember) -> bool {
        if self.data.contains_key(&member.name) {
            return false;
        }
        self.data.insert(member.name.clone(), member);
        true
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn code(&self) -> &[Item] {
        &self.code
    }

    pub fn data(&self) -> impl Iterator<Item = &DataMember> {
        self.data.values()
    }

    /// Move another buffer's code and data to the end of this one.
    pub fn append(&mut self, other: Assembler) {
        self.code.extend(other.code);
        for (_, member) in other.data {
            self.add_data(member);
        }
    }

    pub fn finish(self) -> Assembly {
        Assembly {
            code: self.code,
            data: self.data.into_values().collect(),
        }
    }
}

/// Finished program: code group followed by the data group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assembly {
    pub code: Vec<Item>,
    pub data: Vec<DataMember>,
}

impl Assembly {
    pub fn instruction_count(&self) -> usize {
        self.code
            .iter()
            .filter(|item| matches!(item, Item::Instr(_)))
            .count()
    }
}
