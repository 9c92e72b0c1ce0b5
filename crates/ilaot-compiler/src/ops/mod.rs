//! Opcode dispatch and the per-instruction code generators.
//!
//! Every supported [`OpCode`] has one [`OpEntry`]: an optional scan hook that
//! runs during reachability (queuing methods, fields and types the
//! instruction needs) and an assemble step that runs during code generation.
//! Both are plain functions registered in [`OpCodeMap::x86`].

mod arith;
mod arrays;
mod branches;
mod calls;
mod compare;
mod constants;
mod context;
mod convert;
pub mod frame;
mod indirect;
mod locals;
mod objects;
mod stack;

#[cfg(test)]
mod frame_tests;
#[cfg(test)]
mod objects_tests;
#[cfg(test)]
mod stack_tests;

pub use context::OpContext;
pub use stack::{StackItem, StackModel};

use indexmap::IndexMap;

use ilaot_asm::{Assembler, Instr, Mem, Register::*, Width};
use ilaot_core::{
    FieldId, Instruction, MethodId, OpCode, Operand as IlOperand, TypeId,
};

use crate::layout::round4;
use crate::method_info::MethodInfo;
use crate::session::{MethodData, Session};
use crate::{Error, Result};

pub type ScanFn = fn(&Session<'_>, &Instruction, &MethodInfo, &mut MethodData) -> Result<()>;
pub type AssembleFn = fn(&mut OpContext<'_>, &Instruction) -> Result<()>;
/// Replacement body for a method, emitted between header and footer.
pub type CustomFn = fn(&mut Assembler);

pub type FrameFn = fn(&mut Assembler, &MethodInfo);
pub type ProxyFn = fn(&mut Assembler, &MethodInfo, &MethodInfo);
pub type InitVmtFn = fn(&mut Assembler, &Session<'_>) -> Result<()>;
pub type EntryFn = fn(&mut Assembler, &Session<'_>, MethodId) -> Result<()>;

#[derive(Clone, Copy)]
pub struct OpEntry {
    pub scan: Option<ScanFn>,
    pub assemble: AssembleFn,
}

/// Registration table from opcode kind to generator.
pub struct OpCodeMap {
    entries: IndexMap<OpCode, OpEntry>,
    custom: IndexMap<&'static str, CustomFn>,
    pub header: FrameFn,
    pub footer: FrameFn,
    pub proxy: ProxyFn,
    pub init_vmt: InitVmtFn,
    pub entry: EntryFn,
}

impl OpCodeMap {
    /// The 32-bit x86 stack-machine backend.
    pub fn x86() -> Self {
        use OpCode::*;

        let mut map = Self {
            entries: IndexMap::new(),
            custom: IndexMap::new(),
            header: frame::method_header,
            footer: frame::method_footer,
            proxy: frame::plug_proxy,
            init_vmt: crate::vmt::emit_init_vmt,
            entry: frame::entry_point,
        };

        map.register(&[Nop, Volatile, Endfinally], None, stack::nop);
        map.register(&[Dup], None, stack::dup);
        map.register(&[Pop], None, stack::pop);

        map.register(
            &[
                LdcI4M1, LdcI40, LdcI41, LdcI42, LdcI43, LdcI44, LdcI45, LdcI46, LdcI47, LdcI48,
                LdcI4S, LdcI4,
            ],
            None,
            constants::ldc_i4,
        );
        map.register(&[LdcI8], None, constants::ldc_i8);
        map.register(&[LdcR4, LdcR8], None, constants::ldc_r);
        map.register(&[Ldnull], None, constants::ldnull);
        map.register(&[Ldstr], Some(constants::scan_ldstr), constants::ldstr);

        map.register(&[Ldloc0, Ldloc1, Ldloc2, Ldloc3, LdlocS, Ldloc], None, locals::ldloc);
        map.register(&[Stloc0, Stloc1, Stloc2, Stloc3, StlocS, Stloc], None, locals::stloc);
        map.register(&[LdlocaS, Ldloca], None, locals::ldloca);
        map.register(&[Ldarg0, Ldarg1, Ldarg2, Ldarg3, LdargS, Ldarg], None, locals::ldarg);
        map.register(&[StargS, Starg], None, locals::starg);
        map.register(&[LdargaS, Ldarga], None, locals::ldarga);

        map.register(&[Add, Sub, And, Or, Xor], None, arith::binary);
        map.register(&[Mul], None, arith::mul);
        map.register(&[Div, DivUn, Rem, RemUn], None, arith::divide);
        map.register(&[Shl, Shr, ShrUn], None, arith::shift);
        map.register(&[Neg, Not], None, arith::unary);

        map.register(
            &[ConvI1, ConvI2, ConvI4, ConvI, ConvU1, ConvU2, ConvU4, ConvU, ConvI8, ConvU8],
            None,
            convert::conv,
        );

        map.register(&[Ceq, Cgt, CgtUn, Clt, CltUn], None, compare::compare);
        map.register(&[Br, BrS, Leave, LeaveS], None, branches::br);
        map.register(&[Brtrue, BrtrueS, Brfalse, BrfalseS], None, branches::br_bool);
        map.register(
            &[
                Beq, BeqS, BneUn, BneUnS, Bge, BgeS, BgeUn, BgeUnS, Bgt, BgtS, BgtUn, BgtUnS, Ble,
                BleS, BleUn, BleUnS, Blt, BltS, BltUn, BltUnS,
            ],
            None,
            branches::br_compare,
        );
        map.register(&[Switch], None, branches::switch);
        map.register(&[Throw], None, branches::throw);
        map.register(&[Ret], None, branches::ret);

        map.register(&[Call, Callvirt], Some(calls::scan_call), calls::call);
        map.register(&[Newobj], Some(calls::scan_newobj), calls::newobj);
        map.register(&[Ldftn], Some(calls::scan_ldftn), calls::ldftn);

        map.register(&[Ldfld], Some(objects::scan_field), objects::ldfld);
        map.register(&[Ldflda], Some(objects::scan_field), objects::ldflda);
        map.register(&[Stfld], Some(objects::scan_field), objects::stfld);
        map.register(&[Ldsfld], Some(objects::scan_static_field), objects::ldsfld);
        map.register(&[Ldsflda], Some(objects::scan_static_field), objects::ldsflda);
        map.register(&[Stsfld], Some(objects::scan_static_field), objects::stsfld);
        map.register(&[Box], Some(objects::scan_box), objects::box_value);
        map.register(&[Unbox, UnboxAny], Some(objects::scan_type), objects::unbox);
        map.register(&[Castclass], Some(objects::scan_type), objects::castclass);
        map.register(&[Isinst], Some(objects::scan_type), objects::isinst);
        map.register(&[Initobj], Some(objects::scan_type), objects::initobj);
        map.register(&[Ldobj], Some(objects::scan_type), objects::ldobj);
        map.register(&[Stobj], Some(objects::scan_type), objects::stobj);
        map.register(&[Sizeof], Some(objects::scan_type), objects::size_of);

        map.register(&[Newarr], Some(arrays::scan_newarr), arrays::newarr);
        map.register(&[Ldlen], None, arrays::ldlen);
        map.register(&[Ldelema], Some(objects::scan_type), arrays::ldelema);
        map.register(
            &[
                LdelemI1, LdelemU1, LdelemI2, LdelemU2, LdelemI4, LdelemU4, LdelemI8, LdelemI,
                LdelemR4, LdelemR8, LdelemRef, Ldelem,
            ],
            Some(arrays::scan_typed_element),
            arrays::ldelem,
        );
        map.register(
            &[
                StelemI, StelemI1, StelemI2, StelemI4, StelemI8, StelemR4, StelemR8, StelemRef,
                Stelem,
            ],
            Some(arrays::scan_typed_element),
            arrays::stelem,
        );

        map.register(
            &[
                LdindI1, LdindU1, LdindI2, LdindU2, LdindI4, LdindU4, LdindI8, LdindI, LdindR4,
                LdindR8, LdindRef,
            ],
            None,
            indirect::ldind,
        );
        map.register(
            &[StindI1, StindI2, StindI4, StindI8, StindI, StindRef, StindR4, StindR8],
            None,
            indirect::stind,
        );
        map.register(&[Localloc], Some(indirect::scan_localloc), indirect::localloc);

        map.custom
            .insert("System.Void System.Object..ctor()", |_asm: &mut Assembler| {});

        map
    }

    fn register(&mut self, ops: &[OpCode], scan: Option<ScanFn>, assemble: AssembleFn) {
        for &op in ops {
            self.entries.insert(op, OpEntry { scan, assemble });
        }
    }

    pub fn handler(&self, op: OpCode) -> Result<&OpEntry> {
        self.entries.get(&op).ok_or(Error::UnsupportedOpCode(op))
    }

    pub fn supports(&self, op: OpCode) -> bool {
        self.entries.contains_key(&op)
    }

    /// Run the scan hook of `instr`, if its kind has one.
    pub fn scan(
        &self,
        session: &Session<'_>,
        instr: &Instruction,
        info: &MethodInfo,
        data: &mut MethodData,
    ) -> Result<()> {
        match self.handler(instr.op)?.scan {
            Some(scan) => scan(session, instr, info, data),
            None => Ok(()),
        }
    }

    /// Built-in body for the method with this display signature.
    pub fn custom_implementation(&self, signature: &str) -> Option<CustomFn> {
        self.custom.get(signature).copied()
    }
}

fn missing(instr: &Instruction) -> Error {
    Error::MissingOperand {
        op: instr.op,
        offset: instr.offset,
    }
}

fn operand_int(instr: &Instruction) -> Result<i32> {
    match instr.operand {
        IlOperand::Int(v) => Ok(v),
        _ => Err(missing(instr)),
    }
}

fn operand_method(instr: &Instruction) -> Result<MethodId> {
    match instr.operand {
        IlOperand::Method(id) => Ok(id),
        _ => Err(missing(instr)),
    }
}

fn operand_field(instr: &Instruction) -> Result<FieldId> {
    match instr.operand {
        IlOperand::Field(id) => Ok(id),
        _ => Err(missing(instr)),
    }
}

fn operand_type(instr: &Instruction) -> Result<TypeId> {
    match instr.operand {
        IlOperand::Type(id) => Ok(id),
        _ => Err(missing(instr)),
    }
}

fn operand_target(instr: &Instruction) -> Result<u32> {
    match instr.operand {
        IlOperand::Target(t) => Ok(t),
        _ => Err(missing(instr)),
    }
}

/// Local or argument index of the long and short forms.
fn operand_index(instr: &Instruction) -> Result<usize> {
    match instr.operand {
        IlOperand::Local(i) | IlOperand::Arg(i) => Ok(i as usize),
        IlOperand::Int(i) if i >= 0 => Ok(i as usize),
        _ => Err(missing(instr)),
    }
}

fn unsupported(instr: &Instruction, reason: impl Into<String>) -> Error {
    Error::Unsupported {
        op: instr.op,
        reason: reason.into(),
    }
}

/// Load a value of at most 4 bytes into `eax`, widening narrow ones.
fn load_eax(asm: &mut Assembler, src: Mem, size: u32, signed: bool) {
    let width = match size {
        1 => Width::Byte,
        2 => Width::Word,
        _ => {
            asm.mov(Eax, src);
            return;
        }
    };
    let src = src.into();
    asm.emit(if signed {
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
}

/// Push `size` bytes read from `src`. Narrow values are widened to a word.
fn emit_load(asm: &mut Assembler, src: Mem, size: u32, signed: bool) {
    match size {
        0 => {}
        1 | 2 => {
            load_eax(asm, src, size, signed);
            asm.push(Eax);
        }
        _ => {
            for word in (0..round4(size) / 4).rev() {
                asm.push(src.offset(word as i32 * 4));
            }
        }
    }
}

/// Pop a `size`-byte value into `dst`. `dst` must not be based on `edx`.
fn emit_store(asm: &mut Assembler, dst: Mem, size: u32) {
    let width = match size {
        0 => return,
        1 => Width::Byte,
        2 => Width::Word,
        _ => {
            for word in 0..round4(size) / 4 {
                asm.pop(dst.offset(word as i32 * 4));
            }
            return;
        }
    };
    asm.pop(Edx);
    asm.emit(Instr::Store {
        dst,
        src: Edx,
        width,
    });
}
