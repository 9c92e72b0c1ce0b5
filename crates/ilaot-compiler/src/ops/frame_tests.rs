use ilaot_asm::Assembler;
use ilaot_core::OpCode::*;
use ilaot_core::{CustomAssembler, MethodDef, MethodId, Operand, Program};

use crate::method_info::{MethodInfo, resolve_method};
use crate::ops::frame::{custom_assembler, entry_point, method_footer, method_header, plug_proxy};
use crate::session::MethodData;
use crate::test_utils::{ProgramBuilder, code, def, listing, op, param, scanned, session};

/// `Add(Int32, Int32) -> Int32` with one `Int32` local.
fn adder() -> (Program, MethodId) {
    let mut b = ProgramBuilder::new();
    let mut body = code(vec![op(Ldarg0), op(Ldarg1), op(Add), op(Ret)]);
    body.locals = vec![b.int32];
    let add = b.method(MethodDef {
        params: vec![param(b.int32), param(b.int32)],
        return_type: Some(b.int32),
        body: Some(body),
        ..def(b.kernel, "Add")
    });
    (b.build(), add)
}

fn frame_of(program: &Program, method: MethodId, label: &str, debug: bool) -> MethodInfo {
    let session = session(program);
    resolve_method(&session, method, method, label, None, debug, &MethodData::new()).unwrap()
}

#[test]
fn header_and_footer() {
    let (program, add) = adder();
    let info = frame_of(&program, add, "Add", false);

    let mut asm = Assembler::new();
    method_header(&mut asm, &info);
    method_footer(&mut asm, &info);

    insta::assert_snapshot!(listing(&asm), @r"
    Add:
        push ebp
        mov ebp, esp
        push dword 0
    Add__END_OF_METHOD:
        xor ecx, ecx
        pop dword [ebp + 12]
    Add__EXCEPTION_EXIT:
        mov esp, ebp
        pop ebp
        ret 4
    ");
}

#[test]
fn debug_header_describes_the_frame() {
    let (program, add) = adder();
    let info = frame_of(&program, add, "Add", true);

    let mut asm = Assembler::new();
    method_header(&mut asm, &info);

    insta::assert_snapshot!(listing(&asm), @r"
    Add:
        ; Add
        ; locals (4 bytes)
        ;   [0] offset 0 size 4
        ; arguments (8 bytes)
        ;   [0] arg offset 4 size 4 in
        ;   [1] arg offset 0 size 4 in
        ; return size 4, extra stack -4
        push ebp
        mov ebp, esp
        push dword 0
    ");
}

#[test]
fn synthetic_frames_return_without_popping() {
    let info = MethodInfo::synthetic("stub");

    let mut asm = Assembler::new();
    method_header(&mut asm, &info);
    method_footer(&mut asm, &info);

    insta::assert_snapshot!(listing(&asm), @r"
    stub:
        push ebp
        mov ebp, esp
    stub__END_OF_METHOD:
        xor ecx, ecx
    stub__EXCEPTION_EXIT:
        mov esp, ebp
        pop ebp
        ret
    ");
}

#[test]
fn proxy_forwards_arguments_in_push_order() {
    let (program, add) = adder();
    let original = frame_of(&program, add, "orig", false);
    let replacement = frame_of(&program, add, "repl", false);

    let mut asm = Assembler::new();
    asm.label("orig");
    plug_proxy(&mut asm, &original, &replacement);

    insta::assert_snapshot!(listing(&asm), @r"
    orig:
        push dword [ebp + 12]
        push dword [ebp + 8]
        call repl
        test ecx, 2
        jne orig__EXCEPTION_EXIT
    ");
}

#[test]
fn proxy_reserves_room_for_a_wide_result() {
    let mut b = ProgramBuilder::new();
    let widen = b.method(MethodDef {
        params: vec![param(b.int32)],
        return_type: Some(b.int64),
        body: Some(code(vec![op(Ldarg0), op(ConvI8), op(Ret)])),
        ..def(b.kernel, "Widen")
    });
    let program = b.build();
    let original = frame_of(&program, widen, "orig", false);
    let replacement = frame_of(&program, widen, "repl", false);
    assert_eq!(replacement.padding(), 4);

    let mut asm = Assembler::new();
    asm.label("orig");
    plug_proxy(&mut asm, &original, &replacement);

    insta::assert_snapshot!(listing(&asm), @r"
    orig:
        push dword [ebp + 12]
        sub esp, 4
        call repl
        test ecx, 2
        jne orig__EXCEPTION_EXIT
    ");
}

#[test]
fn custom_assembler_bodies() {
    let mut asm = Assembler::new();
    for (label, kind) in [
        ("halt", CustomAssembler::Halt),
        ("cli", CustomAssembler::DisableInterrupts),
        ("sti", CustomAssembler::EnableInterrupts),
        ("brk", CustomAssembler::DebugBreak),
    ] {
        asm.label(label);
        custom_assembler(&mut asm, kind);
    }

    insta::assert_snapshot!(listing(&asm), @r"
    halt:
        cli
        hlt
    cli:
        cli
    sti:
        sti
    brk:
        int3
    ");
}

#[test]
fn entry_point_runs_static_constructors_before_the_program() {
    let mut b = ProgramBuilder::new();
    let config = b.class("App.Config", b.object);
    let limit = b.static_field(config, "Limit", b.int32);
    b.method(MethodDef {
        body: Some(code(vec![op(Ret)])),
        ..def(config, ".cctor")
    });
    let init = b.entry(code(vec![(Ldsfld, Operand::Field(limit)), op(Pop), op(Ret)]));
    let program = b.build();
    let session = scanned(&program, 1);

    let mut asm = Assembler::new();
    entry_point(&mut asm, &session, init).unwrap();

    insta::assert_snapshot!(listing(&asm), @r"
    ilaot_EntryPoint:
        call System_DVoid_SApp_DRuntime_DInitializeApplication_L_R
        call ____INIT__VMT____
        ; static constructor of App.Config
        call System_DVoid_SApp_DConfig_D_Dcctor_L_R
        call System_DVoid_SApp_DKernel_DInit_L_R
        push dword 0
        call System_DVoid_SApp_DRuntime_DFinalizeApplication_LSystem_DInt32_R
        cli
    ilaot_EntryPoint__HALT:
        hlt
        jmp ilaot_EntryPoint__HALT
    ");
}
