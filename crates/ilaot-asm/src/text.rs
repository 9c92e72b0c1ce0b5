//! NASM text rendering.
//!
//! Output is split in two files: `{stem}.asm` holds the code group and
//! `%include`s `{stem}.data.asm`, which holds the data group.

use std::fmt::{self, Display, Write as _};

use crate::assembler::Assembly;
use crate::instruction::{DataItem, DataMember, Instr, Item, Mem, MemBase, Operand, ShiftCount, Width};
use crate::register::Register;

const INDENT: &str = "    ";
const BYTES_PER_LINE: usize = 16;

/// Rendered code and data files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOutput {
    pub code_file: String,
    pub code: String,
    pub data_file: String,
    pub data: String,
}

pub fn render(asm: &Assembly, stem: &str) -> TextOutput {
    let data_file = format!("{stem}.data.asm");
    TextOutput {
        code_file: format!("{stem}.asm"),
        code: render_code(&asm.code, &data_file),
        data: render_data(&asm.data),
        data_file,
    }
}

pub fn render_code(items: &[Item], data_file: &str) -> String {
    let mut out = String::new();
    writeln!(out, "bits 32").unwrap();
    writeln!(out, "section .text").unwrap();
    for item in items {
        match item {
            Item::Label(name) => writeln!(out, "{name}:").unwrap(),
            Item::Instr(instr) => writeln!(out, "{INDENT}{instr}").unwrap(),
            Item::Comment(text) => writeln!(out, "{INDENT}; {text}").unwrap(),
        }
    }
    writeln!(out).unwrap();
    writeln!(out, "%include \"{data_file}\"").unwrap();
    out
}

pub fn render_data(members: &[DataMember]) -> String {
    let mut out = String::new();
    writeln!(out, "section .data").unwrap();
    for member in members {
        writeln!(out, "align 4").unwrap();
        writeln!(out, "{}:", member.name).unwrap();
        for item in &member.items {
            match item {
                DataItem::Bytes(bytes) => {
                    for chunk in bytes.chunks(BYTES_PER_LINE) {
                        let list: Vec<String> = chunk.iter().map(|b| b.to_string()).collect();
                        writeln!(out, "{INDENT}db {}", list.join(", ")).unwrap();
                    }
                }
                DataItem::Dword(v) => writeln!(out, "{INDENT}dd 0x{v:08X}").unwrap(),
                DataItem::Address(label) => writeln!(out, "{INDENT}dd {label}").unwrap(),
            }
        }
    }
    out
}

impl Display for Mem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base: &dyn Display = match &self.base {
            MemBase::Reg(r) => r,
            MemBase::Label(l) => l,
        };
        match self.disp {
            0 => write!(f, "[{base}]"),
            d if d < 0 => write!(f, "[{base} - {}]", -(d as i64)),
            d => write!(f, "[{base} + {d}]"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::Addr(l) => write!(f, "{l}"),
            Operand::Mem(m) => write!(f, "dword {m}"),
        }
    }
}

fn narrow(op: &Operand, width: Width) -> String {
    match op {
        Operand::Reg(r) => narrow_reg(*r, width).to_owned(),
        Operand::Mem(m) => format!("{} {m}", width.keyword()),
        other => other.to_string(),
    }
}

fn narrow_reg(r: Register, width: Width) -> &'static str {
    match width {
        Width::Byte => r.byte_name().unwrap_or("?"),
        Width::Word => r.word_name(),
        Width::Dword => r.name(),
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Push(Operand::Imm(v)) => write!(f, "push dword {v}"),
            Instr::Push(op) => write!(f, "push {op}"),
            Instr::Pop(op) => write!(f, "pop {op}"),
            Instr::Mov(dst, src) => write!(f, "mov {dst}, {src}"),
            Instr::Store { dst, src, width } => write!(
                f,
                "mov {} {dst}, {}",
                width.keyword(),
                narrow_reg(*src, *width)
            ),
            Instr::Movzx { dst, src, width } => write!(f, "movzx {dst}, {}", narrow(src, *width)),
            Instr::Movsx { dst, src, width } => write!(f, "movsx {dst}, {}", narrow(src, *width)),
            Instr::Lea(dst, src) => write!(f, "lea {dst}, {src}"),
            Instr::Alu(op, dst, src) => write!(f, "{} {dst}, {src}", op.mnemonic()),
            Instr::Test(dst, src) => write!(f, "test {dst}, {src}"),
            Instr::Imul(dst, src) => write!(f, "imul {dst}, {src}"),
            Instr::ImulImm(dst, src, imm) => write!(f, "imul {dst}, {src}, {imm}"),
            Instr::Unary(op, target) => write!(f, "{} {target}", op.mnemonic()),
            Instr::Shift(op, dst, ShiftCount::Cl) => write!(f, "{} {dst}, cl", op.mnemonic()),
            Instr::Shift(op, dst, ShiftCount::Imm(n)) => {
                write!(f, "{} {dst}, {n}", op.mnemonic())
            }
            Instr::Cdq => f.write_str("cdq"),
            Instr::Setcc(cond, dst) => write!(
                f,
                "set{} {}",
                cond.suffix(),
                narrow_reg(*dst, Width::Byte)
            ),
            Instr::Jmp(label) => write!(f, "jmp {label}"),
            Instr::Jcc(cond, label) => write!(f, "j{} {label}", cond.suffix()),
            Instr::Call(target) => write!(f, "call {target}"),
            Instr::Ret(0) => f.write_str("ret"),
            Instr::Ret(n) => write!(f, "ret {n}"),
            Instr::Cli => f.write_str("cli"),
            Instr::Sti => f.write_str("sti"),
            Instr::Hlt => f.write_str("hlt"),
            Instr::Int3 => f.write_str("int3"),
            Instr::Nop => f.write_str("nop"),
        }
    }
}
