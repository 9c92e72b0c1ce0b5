use ilaot_core::OpCode::*;
use ilaot_core::{MethodDef, Operand};

use crate::ops::StackItem;
use crate::test_utils::{ProgramBuilder, assemble, code, def, op, param, session, type_ordinal};

#[test]
fn box_copies_the_value_behind_a_header() {
    let mut b = ProgramBuilder::new();
    let point = b.value_type("App.Point");
    b.field(point, "X", b.int32);
    b.field(point, "Y", b.int32);
    let mut body = code(vec![op(Ldloc0), (Box, Operand::Type(point))]);
    body.locals = vec![point];
    let id = b.called(MethodDef {
        body: Some(body),
        ..def(b.kernel, "Wrap")
    });
    let program = b.build();
    let point_id = type_ordinal(&program, point);

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::boxed()));
    assert_eq!(stack.depth_words(), 1);
    let text = text.replace(&format!("[eax], {point_id}\n"), "[eax], POINT\n");
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp - 4]
        push dword [ebp - 8]
    T.IL_0001:
        push dword 20
        call System_DInt32_SApp_DRuntime_DAllocNewObject_LSystem_DInt32_R
        test ecx, 2
        je T.IL_0001.ok1
        add esp, 12
        jmp T__EXCEPTION_EXIT
    T.IL_0001.ok1:
        pop eax
        mov dword [eax], POINT
        mov dword [eax + 4], 2
        pop dword [eax + 12]
        pop dword [eax + 16]
        push eax
    ");
}

#[test]
fn boxing_a_reference_emits_nothing() {
    let mut b = ProgramBuilder::new();
    let id = b.called(MethodDef {
        params: vec![param(b.string)],
        body: Some(code(vec![op(Ldarg0), (Box, Operand::Type(b.string))])),
        ..def(b.kernel, "Same")
    });
    let program = b.build();

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::reference()));
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp + 8]
    T.IL_0001:
    ");
}

/// `App.Square : App.Polygon : App.Shape`, with the accessed fields on
/// `App.Shape`.
#[test]
fn fields_of_a_grandparent_through_a_child_reference() {
    let mut b = ProgramBuilder::new();
    let shape = b.class("App.Shape", b.object);
    let id_field = b.field(shape, "Id", b.int32);
    let tag = b.field(shape, "Tag", b.int64);
    let polygon = b.class("App.Polygon", shape);
    b.field(polygon, "Sides", b.int32);
    let square = b.class("App.Square", polygon);
    b.field(square, "Side", b.int32);
    let id = b.called(MethodDef {
        params: vec![param(square)],
        body: Some(code(vec![
            op(Ldarg0),
            (Ldfld, Operand::Field(tag)),
            op(Pop),
            op(Ldarg0),
            op(LdcI47),
            (Stfld, Operand::Field(id_field)),
            op(Ldarg0),
            (Ldflda, Operand::Field(tag)),
        ])),
        ..def(b.kernel, "Touch")
    });
    let program = b.build();

    let layout = session(&program).layouts().resolve_fields(square).unwrap();
    let tag_name = program.field_full_name(tag).unwrap();
    assert_eq!(layout.field(&tag_name).unwrap().offset, 4);

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::address()));
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp + 8]
    T.IL_0001:
        pop eax
        push dword [eax + 20]
        push dword [eax + 16]
    T.IL_0002:
        add esp, 8
    T.IL_0003:
        push dword [ebp + 8]
    T.IL_0004:
        push dword 7
    T.IL_0005:
        mov ecx, dword [esp + 4]
        pop dword [ecx + 12]
        add esp, 4
    T.IL_0006:
        push dword [ebp + 8]
    T.IL_0007:
        pop eax
        lea eax, [eax + 16]
        push eax
    ");
}

#[test]
fn wide_field_load_leaves_two_words() {
    let mut b = ProgramBuilder::new();
    let clock = b.class("App.Clock", b.object);
    let ticks = b.field(clock, "Ticks", b.int64);
    let id = b.called(MethodDef {
        params: vec![param(clock)],
        body: Some(code(vec![op(Ldarg0), (Ldfld, Operand::Field(ticks))])),
        ..def(b.kernel, "Read")
    });
    let program = b.build();

    let (_, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::value(8)));
    assert_eq!(stack.depth_words(), 2);
}

#[test]
fn isinst_nulls_a_failed_test() {
    let mut b = ProgramBuilder::new();
    let id = b.called(MethodDef {
        params: vec![param(b.object)],
        body: Some(code(vec![op(Ldarg0), (Isinst, Operand::Type(b.string))])),
        ..def(b.kernel, "AsString")
    });
    let string = b.string;
    let program = b.build();
    let string_id = type_ordinal(&program, string);

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::reference()));
    let text = text.replace(
        &format!("push dword {string_id}\n    call"),
        "push dword STRING\n    call",
    );
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp + 8]
    T.IL_0001:
        push dword [esp]
        push dword STRING
        call System_DBoolean_SApp_DRuntime_DIsInstance_LSystem_DObject_C_SSystem_DInt32_R
        pop eax
        test eax, eax
        jne T.IL_0001.isinst1
        mov dword [esp], 0
    T.IL_0001.isinst1:
    ");
}

#[test]
fn unbox_any_reads_the_boxed_payload() {
    let mut b = ProgramBuilder::new();
    let id = b.called(MethodDef {
        params: vec![param(b.object)],
        body: Some(code(vec![op(Ldarg0), (UnboxAny, Operand::Type(b.int32))])),
        ..def(b.kernel, "Unwrap")
    });
    let program = b.build();

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(), Some(&StackItem::value(4)));
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp + 8]
    T.IL_0001:
        pop eax
        push dword [eax + 12]
    ");
}

#[test]
fn initobj_zeroes_a_local_that_ldobj_reads_back() {
    let mut b = ProgramBuilder::new();
    let point = b.value_type("App.Point");
    b.field(point, "X", b.int32);
    b.field(point, "Y", b.int32);
    let mut body = code(vec![
        (LdlocaS, Operand::Local(0)),
        (Initobj, Operand::Type(point)),
        (LdlocaS, Operand::Local(0)),
        (Ldobj, Operand::Type(point)),
    ]);
    body.locals = vec![point];
    let id = b.called(MethodDef {
        body: Some(body),
        ..def(b.kernel, "Reset")
    });
    let program = b.build();

    let (text, stack) = assemble(&program, id).unwrap();

    assert_eq!(stack.len(), 1);
    assert_eq!(stack.depth_words(), 2);
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        lea eax, [ebp - 8]
        push eax
    T.IL_0001:
        pop eax
        mov dword [eax], 0
        mov dword [eax + 4], 0
    T.IL_0002:
        lea eax, [ebp - 8]
        push eax
    T.IL_0003:
        pop eax
        push dword [eax + 4]
        push dword [eax]
    ");
}
