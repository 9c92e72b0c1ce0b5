//! Flat binary encoder.
//!
//! Two passes over the assembly: the first lays out every label, the second
//! emits bytes. Instruction sizes never depend on label values (jumps and
//! calls are always rel32, label operands always abs32), so the first pass
//! can encode with placeholder addresses and keep only the lengths.
//!
//! Image layout: code at `origin`, then the data members, each aligned to 4.

use indexmap::IndexMap;

use crate::assembler::Assembly;
use crate::instruction::{DataItem, Instr, Item, Mem, MemBase, Operand, ShiftCount, Width};
use crate::register::Register;

pub const DEFAULT_ORIGIN: u32 = 0x0010_0000;
pub const MAX_IMAGE_SIZE: u32 = 0x20_0000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("label `{0}` is defined more than once")]
    DuplicateLabel(String),
    #[error("image is {size} bytes, limit is {MAX_IMAGE_SIZE}")]
    ImageTooLarge { size: u32 },
    #[error("cannot encode `{0}`")]
    InvalidOperands(String),
}

type Result<T> = std::result::Result<T, EncodeError>;

/// Encoded image plus the address of every label.
#[derive(Debug, Clone)]
pub struct FlatImage {
    pub origin: u32,
    pub bytes: Vec<u8>,
    pub labels: IndexMap<String, u32>,
}

impl FlatImage {
    pub fn address_of(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }
}

pub fn encode(asm: &Assembly, origin: u32) -> Result<FlatImage> {
    let labels = layout(asm, origin)?;

    let mut bytes = Vec::new();
    let mut pc = origin;
    for item in &asm.code {
        if let Item::Instr(instr) = item {
            let encoded = encode_instr(instr, pc, Some(&labels))?;
            pc += encoded.len() as u32;
            bytes.extend_from_slice(&encoded);
        }
    }

    for member in &asm.data {
        pad_to(&mut bytes, align4(pc) - origin);
        pc = align4(pc);
        for item in &member.items {
            match item {
                DataItem::Bytes(b) => bytes.extend_from_slice(b),
                DataItem::Dword(v) => bytes.extend_from_slice(&v.to_le_bytes()),
                DataItem::Address(label) => {
                    bytes.extend_from_slice(&resolve(Some(&labels), label)?.to_le_bytes())
                }
            }
        }
        pc += member.size();
    }

    Ok(FlatImage {
        origin,
        bytes,
        labels,
    })
}

fn layout(asm: &Assembly, origin: u32) -> Result<IndexMap<String, u32>> {
    let mut labels = IndexMap::new();
    let mut define = |name: &str, at: u32| {
        if labels.insert(name.to_owned(), at).is_some() {
            return Err(EncodeError::DuplicateLabel(name.to_owned()));
        }
        Ok(())
    };

    let mut pc = origin;
    for item in &asm.code {
        match item {
            Item::Label(name) => define(name, pc)?,
            Item::Instr(instr) => pc += encode_instr(instr, pc, None)?.len() as u32,
            Item::Comment(_) => {}
        }
        check_size(pc - origin)?;
    }
    for member in &asm.data {
        pc = align4(pc);
        define(&member.name, pc)?;
        pc += member.size();
        check_size(pc - origin)?;
    }
    Ok(labels)
}

fn check_size(size: u32) -> Result<()> {
    if size > MAX_IMAGE_SIZE {
        return Err(EncodeError::ImageTooLarge { size });
    }
    Ok(())
}

fn align4(v: u32) -> u32 {
    (v + 3) & !3
}

fn pad_to(bytes: &mut Vec<u8>, len: u32) {
    bytes.resize(len as usize, 0);
}

/// Address of `label`; zero while laying out.
fn resolve(labels: Option<&IndexMap<String, u32>>, label: &str) -> Result<u32> {
    match labels {
        None => Ok(0),
        Some(map) => map
            .get(label)
            .copied()
            .ok_or_else(|| EncodeError::UndefinedLabel(label.to_owned())),
    }
}

fn fits_i8(v: i32) -> bool {
    (i8::MIN as i32..=i8::MAX as i32).contains(&v)
}

/// Encode one instruction located at `at`.
pub fn encode_instr(instr: &Instr, at: u32, labels: Option<&IndexMap<String, u32>>) -> Result<Vec<u8>> {
    let mut e = Encoder {
        buf: Vec::with_capacity(8),
        labels,
        instr,
    };
    e.instr(at)?;
    Ok(e.buf)
}

struct Encoder<'a> {
    buf: Vec<u8>,
    labels: Option<&'a IndexMap<String, u32>>,
    instr: &'a Instr,
}

impl Encoder<'_> {
    fn invalid<T>(&self) -> Result<T> {
        Err(EncodeError::InvalidOperands(self.instr.to_string()))
    }

    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn dword(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn imm(&mut self, v: i32) {
        self.dword(v as u32);
    }

    fn label(&self, name: &str) -> Result<u32> {
        resolve(self.labels, name)
    }

    fn modrm(&mut self, md: u8, reg: u8, rm: u8) {
        self.byte((md << 6) | ((reg & 7) << 3) | (rm & 7));
    }

    fn mem(&mut self, reg: u8, m: &Mem) -> Result<()> {
        match &m.base {
            MemBase::Label(name) => {
                let addr = self.label(name)?;
                self.modrm(0b00, reg, 0b101);
                self.dword(addr.wrapping_add(m.disp as u32));
            }
            MemBase::Reg(base) => {
                let md = if m.disp == 0 && *base != Register::Ebp {
                    0b00
                } else if fits_i8(m.disp) {
                    0b01
                } else {
                    0b10
                };
                self.modrm(md, reg, base.code());
                if *base == Register::Esp {
                    self.byte(0x24);
                }
                match md {
                    0b01 => self.byte(m.disp as i8 as u8),
                    0b10 => self.imm(m.disp),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// ModRM for a register-or-memory operand.
    fn rm(&mut self, reg: u8, op: &Operand) -> Result<()> {
        match op {
            Operand::Reg(r) => {
                self.modrm(0b11, reg, r.code());
                Ok(())
            }
            Operand::Mem(m) => self.mem(reg, m),
            _ => self.invalid(),
        }
    }

    fn byte_reg(&self, r: Register) -> Result<u8> {
        if r.byte_name().is_none() {
            return self.invalid();
        }
        Ok(r.code())
    }

    fn rel32(&mut self, target: u32, next: u32) {
        self.dword(target.wrapping_sub(next));
    }

    fn instr(&mut self, at: u32) -> Result<()> {
        let instr = self.instr;
        match instr {
            Instr::Push(op) => match op {
                Operand::Reg(r) => self.byte(0x50 + r.code()),
                Operand::Imm(v) => {
                    self.byte(0x68);
                    self.imm(*v);
                }
                Operand::Addr(l) => {
                    let a = self.label(l)?;
                    self.byte(0x68);
                    self.dword(a);
                }
                Operand::Mem(m) => {
                    self.byte(0xFF);
                    self.mem(6, m)?;
                }
            },
            Instr::Pop(op) => match op {
                Operand::Reg(r) => self.byte(0x58 + r.code()),
                Operand::Mem(m) => {
                    self.byte(0x8F);
                    self.mem(0, m)?;
                }
                _ => return self.invalid(),
            },
            Instr::Mov(dst, src) => match (dst, src) {
                (Operand::Reg(d), Operand::Reg(s)) => {
                    self.byte(0x89);
                    self.modrm(0b11, s.code(), d.code());
                }
                (Operand::Reg(d), Operand::Imm(v)) => {
                    self.byte(0xB8 + d.code());
                    self.imm(*v);
                }
                (Operand::Reg(d), Operand::Addr(l)) => {
                    let a = self.label(l)?;
                    self.byte(0xB8 + d.code());
                    self.dword(a);
                }
                (Operand::Reg(d), Operand::Mem(m)) => {
                    self.byte(0x8B);
                    self.mem(d.code(), m)?;
                }
                (Operand::Mem(m), Operand::Reg(s)) => {
                    self.byte(0x89);
                    self.mem(s.code(), m)?;
                }
                (Operand::Mem(m), Operand::Imm(v)) => {
                    self.byte(0xC7);
                    self.mem(0, m)?;
                    self.imm(*v);
                }
                (Operand::Mem(m), Operand::Addr(l)) => {
                    let a = self.label(l)?;
                    self.byte(0xC7);
                    self.mem(0, m)?;
                    self.dword(a);
                }
                _ => return self.invalid(),
            },
            Instr::Store { dst, src, width } => match width {
                Width::Byte => {
                    let code = self.byte_reg(*src)?;
                    self.byte(0x88);
                    self.mem(code, dst)?;
                }
                Width::Word => {
                    self.byte(0x66);
                    self.byte(0x89);
                    self.mem(src.code(), dst)?;
                }
                Width::Dword => {
                    self.byte(0x89);
                    self.mem(src.code(), dst)?;
                }
            },
            Instr::Movzx { dst, src, width } | Instr::Movsx { dst, src, width } => {
                let signed = matches!(instr, Instr::Movsx { .. });
                let op = match (width, signed) {
                    (Width::Byte, false) => 0xB6,
                    (Width::Word, false) => 0xB7,
                    (Width::Byte, true) => 0xBE,
                    (Width::Word, true) => 0xBF,
                    (Width::Dword, _) => return self.invalid(),
                };
                if let (Operand::Reg(r), Width::Byte) = (src, width) {
                    self.byte_reg(*r)?;
                }
                self.byte(0x0F);
                self.byte(op);
                self.rm(dst.code(), src)?;
            }
            Instr::Lea(dst, m) => {
                self.byte(0x8D);
                self.mem(dst.code(), m)?;
            }
            Instr::Alu(op, dst, src) => {
                let digit = *op as u8;
                match (dst, src) {
                    (Operand::Reg(_) | Operand::Mem(_), Operand::Reg(s)) => {
                        self.byte((digit << 3) | 0x01);
                        self.rm(s.code(), dst)?;
                    }
                    (Operand::Reg(d), Operand::Mem(m)) => {
                        self.byte((digit << 3) | 0x03);
                        self.mem(d.code(), m)?;
                    }
                    (Operand::Reg(_) | Operand::Mem(_), Operand::Imm(v)) if fits_i8(*v) => {
                        self.byte(0x83);
                        self.rm(digit, dst)?;
                        self.byte(*v as i8 as u8);
                    }
                    (Operand::Reg(_) | Operand::Mem(_), Operand::Imm(v)) => {
                        self.byte(0x81);
                        self.rm(digit, dst)?;
                        self.imm(*v);
                    }
                    (Operand::Reg(_) | Operand::Mem(_), Operand::Addr(l)) => {
                        let a = self.label(l)?;
                        self.byte(0x81);
                        self.rm(digit, dst)?;
                        self.dword(a);
                    }
                    _ => return self.invalid(),
                }
            }
            Instr::Test(dst, src) => match src {
                Operand::Reg(s) => {
                    self.byte(0x85);
                    self.modrm(0b11, s.code(), dst.code());
                }
                Operand::Mem(m) => {
                    self.byte(0x85);
                    self.mem(dst.code(), m)?;
                }
                Operand::Imm(v) => {
                    self.byte(0xF7);
                    self.modrm(0b11, 0, dst.code());
                    self.imm(*v);
                }
                Operand::Addr(_) => return self.invalid(),
            },
            Instr::Imul(dst, src) => {
                self.byte(0x0F);
                self.byte(0xAF);
                self.rm(dst.code(), src)?;
            }
            Instr::ImulImm(dst, src, v) => {
                self.byte(0x69);
                self.rm(dst.code(), src)?;
                self.imm(*v);
            }
            Instr::Unary(op, target) => {
                self.byte(0xF7);
                self.rm(*op as u8, target)?;
            }
            Instr::Shift(op, dst, count) => match count {
                ShiftCount::Cl => {
                    self.byte(0xD3);
                    self.modrm(0b11, *op as u8, dst.code());
                }
                ShiftCount::Imm(n) => {
                    self.byte(0xC1);
                    self.modrm(0b11, *op as u8, dst.code());
                    self.byte(*n);
                }
            },
            Instr::Cdq => self.byte(0x99),
            Instr::Setcc(cond, dst) => {
                let code = self.byte_reg(*dst)?;
                self.byte(0x0F);
                self.byte(0x90 + cond.code());
                self.modrm(0b11, 0, code);
            }
            Instr::Jmp(l) => {
                let target = self.label(l)?;
                self.byte(0xE9);
                self.rel32(target, at.wrapping_add(5));
            }
            Instr::Jcc(cond, l) => {
                let target = self.label(l)?;
                self.byte(0x0F);
                self.byte(0x80 + cond.code());
                self.rel32(target, at.wrapping_add(6));
            }
            Instr::Call(target) => match target {
                Operand::Addr(l) => {
                    let t = self.label(l)?;
                    self.byte(0xE8);
                    self.rel32(t, at.wrapping_add(5));
                }
                Operand::Reg(_) | Operand::Mem(_) => {
                    self.byte(0xFF);
                    self.rm(2, target)?;
                }
                Operand::Imm(_) => return self.invalid(),
            },
            Instr::Ret(0) => self.byte(0xC3),
            Instr::Ret(n) => {
                self.byte(0xC2);
                self.buf.extend_from_slice(&n.to_le_bytes());
            }
            Instr::Cli => self.byte(0xFA),
            Instr::Sti => self.byte(0xFB),
            Instr::Hlt => self.byte(0xF4),
            Instr::Int3 => self.byte(0xCC),
            Instr::Nop => self.byte(0x90),
        }
        Ok(())
    }
}
