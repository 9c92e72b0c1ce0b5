use ilaot_asm::{DataItem, DataMember, Operand};
use ilaot_core::image::STRING_TYPE;
use ilaot_core::{Instruction, OpCode, Operand as IlOperand, naming};

use super::{OpContext, StackItem, missing, operand_int};
use crate::Result;
use crate::layout::INSTANCE_NORMAL;
use crate::method_info::MethodInfo;
use crate::session::{MethodData, Session};

pub(super) fn ldc_i4(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let value = match instr.op {
        OpCode::LdcI4M1 => -1,
        OpCode::LdcI40 => 0,
        OpCode::LdcI41 => 1,
        OpCode::LdcI42 => 2,
        OpCode::LdcI43 => 3,
        OpCode::LdcI44 => 4,
        OpCode::LdcI45 => 5,
        OpCode::LdcI46 => 6,
        OpCode::LdcI47 => 7,
        OpCode::LdcI48 => 8,
        _ => operand_int(instr)?,
    };
    ctx.asm.push(value);
    ctx.push(StackItem::value(4));
    Ok(())
}

fn push_u64(ctx: &mut OpContext<'_>, bits: u64) {
    ctx.asm.push((bits >> 32) as u32 as i32);
    ctx.asm.push(bits as u32 as i32);
}

pub(super) fn ldc_i8(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let value = match instr.operand {
        IlOperand::Long(v) => v,
        IlOperand::Int(v) => v as i64,
        _ => return Err(missing(instr)),
    };
    push_u64(ctx, value as u64);
    ctx.push(StackItem::value(8));
    Ok(())
}

/// Float constants load their bit pattern.
pub(super) fn ldc_r(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    match (instr.op, &instr.operand) {
        (OpCode::LdcR4, IlOperand::Single(v)) => {
            ctx.asm.push(v.to_bits() as i32);
            ctx.push(StackItem::float(4));
        }
        (OpCode::LdcR8, IlOperand::Double(v)) => {
            push_u64(ctx, v.to_bits());
            ctx.push(StackItem::float(8));
        }
        _ => return Err(missing(instr)),
    }
    Ok(())
}

pub(super) fn ldnull(ctx: &mut OpContext<'_>, _instr: &Instruction) -> Result<()> {
    ctx.asm.push(0);
    ctx.push(StackItem::reference());
    Ok(())
}

pub(super) fn scan_ldstr(
    session: &Session<'_>,
    _instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let string = session.program().require_type(STRING_TYPE)?;
    session.register_type(string)?;
    Ok(())
}

/// String literals are preallocated objects in the data group:
/// header, character count, UTF-16 characters.
pub(super) fn ldstr(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let IlOperand::String(text) = &instr.operand else {
        return Err(missing(instr));
    };
    let id = ctx.strings.intern(text);
    let label = naming::string_literal_label(id);
    if !ctx.asm.has_data(&label) {
        let string = ctx.program().require_type(STRING_TYPE)?;
        let type_id = ctx.session.register_type(string)?;
        let units: Vec<u16> = text.encode_utf16().collect();
        let chars = units.iter().flat_map(|u| u.to_le_bytes()).collect();
        ctx.asm.add_data(DataMember::new(
            label.clone(),
            vec![
                DataItem::Dword(type_id as u32),
                DataItem::Dword(INSTANCE_NORMAL as u32),
                DataItem::Dword(0),
                DataItem::Dword(units.len() as u32),
                DataItem::Bytes(chars),
            ],
        ));
    }
    ctx.asm.push(Operand::addr(label));
    ctx.push(StackItem::reference());
    Ok(())
}
