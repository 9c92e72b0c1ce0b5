use ilaot_core::OpCode::*;
use ilaot_core::{MethodDef, Operand, TypeKind, TypeShape};

use crate::Error;
use crate::layout::Layouts;
use crate::ops::{StackItem, StackModel};
use crate::test_utils::{ProgramBuilder, assemble, code, def, op};

#[test]
fn items_occupy_whole_words() {
    assert_eq!(StackItem::value(1).bytes(), 4);
    assert_eq!(StackItem::value(1).words(), 1);
    assert_eq!(StackItem::value(8).words(), 2);
    assert_eq!(StackItem::value(12).bytes(), 12);
    assert_eq!(StackItem::value(0).words(), 0);
}

#[test]
fn item_kinds() {
    assert!(StackItem::reference().is_ref);
    assert!(!StackItem::reference().is_address);
    assert!(StackItem::boxed().is_ref);
    assert!(StackItem::boxed().boxed);
    assert!(StackItem::address().is_address);
    assert!(!StackItem::address().is_ref);
    assert!(StackItem::float(8).is_float);
    assert_eq!(StackItem::float(8).words(), 2);
}

#[test]
fn items_of_static_types() {
    let mut b = ProgramBuilder::new();
    b.array_of(b.int32, 1);
    let int32 = b.int32;
    let by_ref = b.add_type("System.Int32&", TypeKind::ValueType, None);
    b.ty_mut(by_ref).shape = TypeShape::ByRef { element: int32 };
    let program = b.build();
    let layouts = Layouts::new(&program, None);
    let item = |name: &str| {
        StackItem::of_type(&program, &layouts, program.require_type(name).unwrap()).unwrap()
    };

    assert_eq!(item("System.Byte"), StackItem::value(1));
    assert_eq!(item("System.Int64"), StackItem::value(8));
    assert_eq!(item("System.String"), StackItem::reference());
    assert_eq!(item("System.Int32[]"), StackItem::reference());
    assert_eq!(item("System.Int32&"), StackItem::address());
}

#[test]
fn model_depth_counts_words() {
    let mut stack = StackModel::default();
    stack.push(StackItem::value(8));
    stack.push(StackItem::reference());
    stack.push(StackItem::value(2));

    assert_eq!(stack.len(), 3);
    assert_eq!(stack.depth_words(), 4);
    assert_eq!(stack.pop(), Some(StackItem::value(2)));
    assert_eq!(stack.peek(), Some(&StackItem::reference()));

    stack.clear();
    assert!(stack.is_empty());
    assert_eq!(stack.pop(), None);
}

#[test]
fn dup_and_pop_of_a_wide_value() {
    let mut b = ProgramBuilder::new();
    let mut body = code(vec![op(Ldloc0), op(Dup), op(Pop), op(Pop), op(Ret)]);
    body.locals = vec![b.int64];
    let id = b.method(MethodDef {
        body: Some(body),
        ..def(b.kernel, "Wide")
    });
    b.entry(code(vec![(Call, Operand::Method(id)), op(Ret)]));
    let program = b.build();

    let (text, stack) = assemble(&program, id).unwrap();

    assert!(stack.is_empty());
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword [ebp - 4]
        push dword [ebp - 8]
    T.IL_0001:
        push dword [esp + 4]
        push dword [esp + 4]
    T.IL_0002:
        add esp, 8
    T.IL_0003:
        add esp, 8
    T.IL_0004:
        jmp T__END_OF_METHOD
    ");
}

#[test]
fn branch_targets_restore_the_recorded_stack() {
    let mut b = ProgramBuilder::new();
    let id = b.method(MethodDef {
        body: Some(code(vec![
            op(LdcI41),
            (BrtrueS, Operand::Target(4)),
            op(LdcI40),
            (BrS, Operand::Target(5)),
            op(LdcI41),
            op(Pop),
            op(Ret),
        ])),
        ..def(b.kernel, "Pick")
    });
    b.entry(code(vec![(Call, Operand::Method(id)), op(Ret)]));
    let program = b.build();

    let (text, stack) = assemble(&program, id).unwrap();

    assert!(stack.is_empty());
    insta::assert_snapshot!(text, @r"
    T.IL_0000:
        push dword 1
    T.IL_0001:
        pop eax
        test eax, eax
        jne T.IL_0004
    T.IL_0002:
        push dword 0
    T.IL_0003:
        jmp T.IL_0005
    T.IL_0004:
        push dword 1
    T.IL_0005:
        add esp, 4
    T.IL_0006:
        jmp T__END_OF_METHOD
    ");
}

#[test]
fn popping_an_empty_stack_is_an_error() {
    let mut b = ProgramBuilder::new();
    let id = b.method(MethodDef {
        body: Some(code(vec![op(Pop), op(Ret)])),
        ..def(b.kernel, "Broken")
    });
    b.entry(code(vec![(Call, Operand::Method(id)), op(Ret)]));
    let program = b.build();

    let err = assemble(&program, id).unwrap_err();

    assert!(matches!(err, Error::StackUnderflow { op: Pop, .. }));
    insta::assert_snapshot!(err, @"operand stack underflow at `pop` in `T`");
}
