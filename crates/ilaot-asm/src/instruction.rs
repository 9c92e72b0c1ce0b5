//! The x86 subset the code generators emit.
//!
//! Every operand is 32 bits wide unless an instruction carries an explicit
//! [`Width`]. Label references always resolve to absolute addresses.

use crate::register::{Condition, Register};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Dword,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Dword => 4,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Width::Byte => "byte",
            Width::Word => "word",
            Width::Dword => "dword",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemBase {
    Reg(Register),
    Label(String),
}

/// Memory operand: `[base + disp]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mem {
    pub base: MemBase,
    pub disp: i32,
}

impl Mem {
    pub fn at(base: Register, disp: i32) -> Self {
        Self {
            base: MemBase::Reg(base),
            disp,
        }
    }

    pub fn label(name: impl Into<String>, disp: i32) -> Self {
        Self {
            base: MemBase::Label(name.into()),
            disp,
        }
    }

    /// Same base, displacement moved by `delta`.
    pub fn offset(&self, delta: i32) -> Self {
        Self {
            base: self.base.clone(),
            disp: self.disp + delta,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Imm(i32),
    /// Absolute address of a label, as an immediate.
    Addr(String),
    Mem(Mem),
}

impl Operand {
    pub fn addr(label: impl Into<String>) -> Self {
        Operand::Addr(label.into())
    }
}

impl From<Register> for Operand {
    fn from(r: Register) -> Self {
        Operand::Reg(r)
    }
}

impl From<Mem> for Operand {
    fn from(m: Mem) -> Self {
        Operand::Mem(m)
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Imm(v)
    }
}

/// Two-operand integer ops sharing the `00..3F` opcode block. Discriminant is the `/digit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AluOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Or => "or",
            AluOp::Adc => "adc",
            AluOp::Sbb => "sbb",
            AluOp::And => "and",
            AluOp::Sub => "sub",
            AluOp::Xor => "xor",
            AluOp::Cmp => "cmp",
        }
    }
}

/// Group 3 (`F7 /digit`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UnaryOp {
    Not = 2,
    Neg = 3,
    Mul = 4,
    Div = 6,
    Idiv = 7,
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "neg",
            UnaryOp::Mul => "mul",
            UnaryOp::Div => "div",
            UnaryOp::Idiv => "idiv",
        }
    }
}

/// Group 2 (`D3 /digit`, `C1 /digit ib`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

impl ShiftOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ShiftOp::Shl => "shl",
            ShiftOp::Shr => "shr",
            ShiftOp::Sar => "sar",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftCount {
    Cl,
    Imm(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// `push r32 | imm32 | label | dword [mem]`
    Push(Operand),
    /// `pop r32 | dword [mem]`
    Pop(Operand),
    /// Dword move. Memory to memory is not encodable.
    Mov(Operand, Operand),
    /// Narrow store of a register's low byte or word.
    Store {
        dst: Mem,
        src: Register,
        width: Width,
    },
    /// Zero-extending load from a narrow register view or memory.
    Movzx {
        dst: Register,
        src: Operand,
        width: Width,
    },
    /// Sign-extending load from a narrow register view or memory.
    Movsx {
        dst: Register,
        src: Operand,
        width: Width,
    },
    Lea(Register, Mem),
    Alu(AluOp, Operand, Operand),
    Test(Register, Operand),
    /// `imul r32, r/m32`
    Imul(Register, Operand),
    /// `imul r32, r/m32, imm32`
    ImulImm(Register, Operand, i32),
    Unary(UnaryOp, Operand),
    Shift(ShiftOp, Register, ShiftCount),
    Cdq,
    /// `setcc r8` on the low byte of the register.
    Setcc(Condition, Register),
    Jmp(String),
    Jcc(Condition, String),
    /// `call label` (rel32) or `call r32`.
    Call(Operand),
    /// `ret` / `ret imm16`.
    Ret(u16),
    Cli,
    Sti,
    Hlt,
    Int3,
    Nop,
}

/// One line of the code group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Label(String),
    Instr(Instr),
    Comment(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataItem {
    Bytes(Vec<u8>),
    Dword(u32),
    /// Absolute address of a label.
    Address(String),
}

impl DataItem {
    pub fn size(&self) -> u32 {
        match self {
            DataItem::Bytes(b) => b.len() as u32,
            DataItem::Dword(_) | DataItem::Address(_) => 4,
        }
    }
}

/// Named, 4-aligned data member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataMember {
    pub name: String,
    pub items: Vec<DataItem>,
}

impl DataMember {
    pub fn new(name: impl Into<String>, items: Vec<DataItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    /// Zero-filled member of `size` bytes.
    pub fn zeroed(name: impl Into<String>, size: u32) -> Self {
        Self::new(name, vec![DataItem::Bytes(vec![0; size as usize])])
    }

    pub fn size(&self) -> u32 {
        self.items.iter().map(DataItem::size).sum()
    }
}
