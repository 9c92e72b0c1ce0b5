//! Fields, boxing and type tests.
//!
//! Instance fields of classes live after the object header; a value type
//! accessed through an address has no header, so its fields start at 0.

use ilaot_asm::{AluOp, Condition, Instr, Mem, Operand, Register::*};
use ilaot_core::{FieldDef, Instruction, OpCode, TypeId, naming};

use super::{
    OpContext, StackItem, emit_load, emit_store, load_eax, operand_field, operand_type,
    unsupported,
};
use crate::layout::{BOXED_VALUE_TYPE, FIELD_DATA_OFFSET, FieldInfo, is_float, is_signed, round4};
use crate::method_info::MethodInfo;
use crate::session::{MethodData, Session};
use crate::{Error, Result};

pub(super) fn scan_field(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let field = session.program().field(operand_field(instr)?)?;
    session.register_type(field.declaring)?;
    session.register_type(field.field_type)?;
    Ok(())
}

pub(super) fn scan_static_field(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    let id = operand_field(instr)?;
    let field = session.program().field(id)?;
    session.register_type(field.declaring)?;
    session.register_type(field.field_type)?;
    session.queue_static_field(id)?;
    Ok(())
}

pub(super) fn scan_box(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    session.register_type(operand_type(instr)?)?;
    Ok(())
}

pub(super) fn scan_type(
    session: &Session<'_>,
    instr: &Instruction,
    _info: &MethodInfo,
    _data: &mut MethodData,
) -> Result<()> {
    session.register_type(operand_type(instr)?)?;
    Ok(())
}

struct InstanceField<'a> {
    def: &'a FieldDef,
    info: FieldInfo,
    /// Displacement from the object or value address.
    disp: i32,
    declared_on_value_type: bool,
}

impl InstanceField<'_> {
    fn item(&self, ctx: &OpContext<'_>) -> Result<StackItem> {
        let name = ctx.program().type_name(self.info.field_type)?;
        Ok(StackItem {
            size: self.info.size,
            is_ref: self.info.is_reference,
            boxed: false,
            is_float: is_float(&name),
            is_address: name.ends_with('&') || name.ends_with('*'),
        })
    }

    fn signed(&self, ctx: &OpContext<'_>) -> Result<bool> {
        Ok(is_signed(&ctx.program().type_name(self.info.field_type)?))
    }
}

fn instance_field<'a>(ctx: &OpContext<'a>, instr: &Instruction) -> Result<InstanceField<'a>> {
    let program = ctx.program();
    let id = operand_field(instr)?;
    let def = program.field(id)?;
    let full_name = program.field_full_name(id)?;
    let layout = ctx.layouts().resolve_fields(def.declaring)?;
    let info = layout
        .field(&full_name)
        .cloned()
        .ok_or_else(|| Error::FieldNotInLayout {
            field: full_name.clone(),
            ty: program.type_name(def.declaring).unwrap_or_default(),
        })?;
    let declared_on_value_type = program.ty(def.declaring)?.is_value_type();
    let header = if declared_on_value_type { 0 } else { FIELD_DATA_OFFSET };
    Ok(InstanceField {
        def,
        disp: (header + info.offset) as i32,
        info,
        declared_on_value_type,
    })
}

pub(super) fn ldfld(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = instance_field(ctx, instr)?;
    let holder = ctx.pop(instr.op)?;
    let signed = field.signed(ctx)?;

    if field.declared_on_value_type && !holder.is_ref && !holder.is_address {
        // the struct itself is on the stack
        let at = field.info.offset as i32;
        match field.info.size {
            1..=4 => {
                load_eax(ctx.asm, Mem::at(Esp, at), field.info.size, signed);
                ctx.asm.alu(AluOp::Add, Esp, holder.bytes() as i32);
                ctx.asm.push(Eax);
            }
            5..=8 => {
                ctx.asm.mov(Eax, Mem::at(Esp, at));
                ctx.asm.mov(Edx, Mem::at(Esp, at + 4));
                ctx.asm.alu(AluOp::Add, Esp, holder.bytes() as i32);
                ctx.asm.push(Edx);
                ctx.asm.push(Eax);
            }
            size => {
                return Err(unsupported(
                    instr,
                    format!("{size}-byte field `{}` of a value on the stack", field.def.name),
                ));
            }
        }
    } else {
        ctx.asm.pop(Eax);
        emit_load(ctx.asm, Mem::at(Eax, field.disp), field.info.size, signed);
    }
    let item = field.item(ctx)?;
    ctx.push(item);
    Ok(())
}

pub(super) fn ldflda(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = instance_field(ctx, instr)?;
    ctx.pop(instr.op)?;
    ctx.asm.pop(Eax);
    ctx.asm.emit(Instr::Lea(Eax, Mem::at(Eax, field.disp)));
    ctx.asm.push(Eax);
    ctx.push(StackItem::address());
    Ok(())
}

pub(super) fn stfld(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = instance_field(ctx, instr)?;
    let value = ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;
    ctx.asm.mov(Ecx, Mem::at(Esp, value.bytes() as i32));
    emit_store(ctx.asm, Mem::at(Ecx, field.disp), field.info.size);
    ctx.asm.alu(AluOp::Add, Esp, 4);
    Ok(())
}

struct StaticField {
    label: String,
    ty: TypeId,
}

fn static_field(ctx: &OpContext<'_>, instr: &Instruction) -> Result<StaticField> {
    let program = ctx.program();
    let id = operand_field(instr)?;
    Ok(StaticField {
        label: naming::static_field_label(&program.field_full_name(id)?),
        ty: program.field(id)?.field_type,
    })
}

pub(super) fn ldsfld(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = static_field(ctx, instr)?;
    let program = ctx.program();
    let size = ctx.layouts().storage_size(field.ty)?;
    let signed = is_signed(&program.type_name(field.ty)?);
    emit_load(ctx.asm, Mem::label(field.label, 0), size, signed);
    let item = StackItem::of_type(program, &ctx.layouts(), field.ty)?;
    ctx.push(item);
    Ok(())
}

pub(super) fn ldsflda(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = static_field(ctx, instr)?;
    ctx.asm.push(Operand::addr(field.label));
    ctx.push(StackItem::reference());
    Ok(())
}

pub(super) fn stsfld(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let field = static_field(ctx, instr)?;
    ctx.pop(instr.op)?;
    let size = ctx.layouts().storage_size(field.ty)?;
    emit_store(ctx.asm, Mem::label(field.label, 0), size);
    Ok(())
}

pub(super) fn box_value(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let program = ctx.program();
    let value = ctx.pop(instr.op)?;
    if program.ty(ty)?.is_reference() {
        // boxing a reference is the identity
        ctx.push(value);
        return Ok(());
    }

    let size = round4(ctx.layouts().storage_size(ty)?);
    let type_id = ctx.session.register_type(ty)?;
    ctx.asm.push((FIELD_DATA_OFFSET + size) as i32);
    ctx.emit_call(program.runtime.alloc_new_object)?;
    ctx.exception_check_inline(4 + value.bytes());
    ctx.asm.pop(Eax);
    ctx.asm.mov(Mem::at(Eax, 0), type_id as i32);
    ctx.asm.mov(Mem::at(Eax, 4), BOXED_VALUE_TYPE);
    for word in 0..value.words() {
        ctx.asm.pop(Mem::at(Eax, (FIELD_DATA_OFFSET + word * 4) as i32));
    }
    ctx.asm.push(Eax);
    ctx.push(StackItem::boxed());
    Ok(())
}

pub(super) fn unbox(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let program = ctx.program();
    let boxed = ctx.pop(instr.op)?;

    if instr.op == OpCode::Unbox {
        ctx.asm.pop(Eax);
        ctx.asm.alu(AluOp::Add, Eax, FIELD_DATA_OFFSET as i32);
        ctx.asm.push(Eax);
        ctx.push(StackItem::address());
        return Ok(());
    }
    if program.ty(ty)?.is_reference() {
        ctx.push(boxed);
        return Ok(());
    }
    let size = ctx.layouts().storage_size(ty)?;
    let signed = is_signed(&program.type_name(ty)?);
    ctx.asm.pop(Eax);
    emit_load(ctx.asm, Mem::at(Eax, FIELD_DATA_OFFSET as i32), size, signed);
    let item = StackItem::of_type(program, &ctx.layouts(), ty)?;
    ctx.push(item);
    Ok(())
}

/// Unchecked: the reference passes through unchanged.
pub(super) fn castclass(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let item = ctx.pop(instr.op)?;
    ctx.push(StackItem {
        is_ref: true,
        ..item
    });
    Ok(())
}

/// Ask the runtime; a failed test replaces the reference with null.
pub(super) fn isinst(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let program = ctx.program();
    ctx.pop(instr.op)?;
    let type_id = ctx.session.register_type(ty)?;

    ctx.asm.push(Mem::at(Esp, 0));
    ctx.asm.push(type_id as i32);
    ctx.emit_call(program.runtime.is_instance)?;
    ctx.asm.pop(Eax);
    ctx.asm.emit(Instr::Test(Eax, Eax.into()));
    let ok = ctx.fresh_label("isinst");
    ctx.asm.jcc(Condition::Ne, ok.as_str());
    ctx.asm.mov(Mem::at(Esp, 0), 0);
    ctx.asm.label(ok);
    ctx.push(StackItem::reference());
    Ok(())
}

pub(super) fn initobj(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    ctx.pop(instr.op)?;
    let size = round4(ctx.layouts().storage_size(ty)?);
    ctx.asm.pop(Eax);
    for word in 0..size / 4 {
        ctx.asm.mov(Mem::at(Eax, (word * 4) as i32), 0);
    }
    Ok(())
}

pub(super) fn ldobj(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let program = ctx.program();
    ctx.pop(instr.op)?;
    let size = ctx.layouts().storage_size(ty)?;
    let signed = is_signed(&program.type_name(ty)?);
    ctx.asm.pop(Eax);
    emit_load(ctx.asm, Mem::at(Eax, 0), size, signed);
    let item = StackItem::of_type(program, &ctx.layouts(), ty)?;
    ctx.push(item);
    Ok(())
}

pub(super) fn stobj(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let value = ctx.pop(instr.op)?;
    ctx.pop(instr.op)?;
    let size = ctx.layouts().storage_size(ty)?;
    ctx.asm.mov(Ecx, Mem::at(Esp, value.bytes() as i32));
    emit_store(ctx.asm, Mem::at(Ecx, 0), size);
    ctx.asm.alu(AluOp::Add, Esp, 4);
    Ok(())
}

pub(super) fn size_of(ctx: &mut OpContext<'_>, instr: &Instruction) -> Result<()> {
    let ty = operand_type(instr)?;
    let size = ctx.layouts().storage_size(ty)?;
    ctx.asm.push(size as i32);
    ctx.push(StackItem::value(4));
    Ok(())
}
