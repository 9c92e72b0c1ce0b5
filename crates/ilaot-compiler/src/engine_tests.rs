use std::sync::Arc;

use indoc::indoc;
use parking_lot::Mutex;

use ilaot_asm::SymbolFile;
use ilaot_core::OpCode::*;
use ilaot_core::{MethodDef, Operand, Program, naming};

use crate::codegen::CodeGen;
use crate::ops::OpCodeMap;
use crate::test_utils::{ProgramBuilder, code, def, op, param, scanned};
use crate::{CompileOptions, Engine, Error, MethodState, OutputKind, Target};

/// `Init` calls a static `Add(Int32, Int32)` and drops the result.
fn adder() -> Program {
    let mut b = ProgramBuilder::new();
    let add = b.method(MethodDef {
        params: vec![param(b.int32), param(b.int32)],
        return_type: Some(b.int32),
        body: Some(code(vec![op(Ldarg0), op(Ldarg1), op(Add), op(Ret)])),
        ..def(b.kernel, "Add")
    });
    b.entry(code(vec![
        op(LdcI42),
        op(LdcI43),
        (Call, Operand::Method(add)),
        op(Pop),
        op(Ret),
    ]));
    b.build()
}

/// Lines of the method starting at `label`, through its `ret`.
fn method_text(code: &str, label: &str) -> String {
    let mut out = String::new();
    let start = format!("{label}:");
    for line in code.lines().skip_while(|line| *line != start) {
        out.push_str(line);
        out.push('\n');
        if line.starts_with("    ret") {
            break;
        }
    }
    out
}

#[test]
fn entry_routine_comes_first() {
    let program = adder();
    let out = Engine::builder(&program).build().unwrap().compile().unwrap();
    let text = out.text("kernel");

    let head: Vec<_> = text.code.lines().take(13).collect();
    insta::assert_snapshot!(head.join("\n"), @r"
    bits 32
    section .text
    ilaot_EntryPoint:
        call System_DVoid_SApp_DRuntime_DInitializeApplication_L_R
        call ____INIT__VMT____
        call System_DVoid_SApp_DKernel_DInit_L_R
        push dword 0
        call System_DVoid_SApp_DRuntime_DFinalizeApplication_LSystem_DInt32_R
        cli
    ilaot_EntryPoint__HALT:
        hlt
        jmp ilaot_EntryPoint__HALT
    ____INIT__VMT____:
    ");
    assert!(text.code.ends_with("\n%include \"kernel.data.asm\"\n"));
}

#[test]
fn calls_check_the_exception_flag() {
    let program = adder();
    let out = Engine::builder(&program).build().unwrap().compile().unwrap();
    let code = out.text("kernel").code;

    insta::assert_snapshot!(method_text(&code, "System_DVoid_SApp_DKernel_DInit_L_R"), @r"
    System_DVoid_SApp_DKernel_DInit_L_R:
        push ebp
        mov ebp, esp
    System_DVoid_SApp_DKernel_DInit_L_R.IL_0000:
        push dword 2
    System_DVoid_SApp_DKernel_DInit_L_R.IL_0001:
        push dword 3
    System_DVoid_SApp_DKernel_DInit_L_R.IL_0002:
        call System_DInt32_SApp_DKernel_DAdd_LSystem_DInt32_C_SSystem_DInt32_R
        test ecx, 2
        je System_DVoid_SApp_DKernel_DInit_L_R.IL_0003
        add esp, 4
        jmp System_DVoid_SApp_DKernel_DInit_L_R__EXCEPTION_EXIT
    System_DVoid_SApp_DKernel_DInit_L_R.IL_0003:
        add esp, 4
    System_DVoid_SApp_DKernel_DInit_L_R.IL_0004:
        jmp System_DVoid_SApp_DKernel_DInit_L_R__END_OF_METHOD
    System_DVoid_SApp_DKernel_DInit_L_R__END_OF_METHOD:
        xor ecx, ecx
    System_DVoid_SApp_DKernel_DInit_L_R__EXCEPTION_EXIT:
        mov esp, ebp
        pop ebp
        ret
    ");
}

#[test]
fn callee_leaves_its_result_in_the_first_argument_slot() {
    let program = adder();
    let out = Engine::builder(&program).build().unwrap().compile().unwrap();
    let code = out.text("kernel").code;
    let label = "System_DInt32_SApp_DKernel_DAdd_LSystem_DInt32_C_SSystem_DInt32_R";

    let text = method_text(&code, label).replace(label, "Add");
    insta::assert_snapshot!(text, @r"
    Add:
        push ebp
        mov ebp, esp
    Add.IL_0000:
        push dword [ebp + 12]
    Add.IL_0001:
        push dword [ebp + 8]
    Add.IL_0002:
        pop eax
        add dword [esp], eax
    Add.IL_0003:
        jmp Add__END_OF_METHOD
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
fn code_generation_finishes_every_method() {
    let program = adder();
    let session = scanned(&program, 1);
    let ids = session.method_ids();
    for &id in &ids {
        assert_eq!(session.method_state(id), Some(MethodState::PreProcessed));
    }

    let map = OpCodeMap::x86();
    let entry = program.entry_point().unwrap();
    CodeGen::new(&session, &map)
        .emit_program(entry, &|_, _| {}, &|_, _| {})
        .unwrap();

    for &id in &ids {
        assert_eq!(session.method_state(id), Some(MethodState::Processed));
    }
}

#[test]
fn data_file_holds_statics_and_the_current_exception() {
    let mut b = ProgramBuilder::new();
    let ticks = b.static_field(b.kernel, "Ticks", b.int64);
    b.entry(code(vec![(Ldsfld, Operand::Field(ticks)), op(Pop), op(Ret)]));
    let program = b.build();

    let out = Engine::builder(&program).build().unwrap().compile().unwrap();

    insta::assert_snapshot!(out.text("kernel").data, @r"
    section .data
    align 4
    static_field__App_DKernel_DTicks:
        db 0, 0, 0, 0, 0, 0, 0, 0
    align 4
    ilaot_CurrentException:
        db 0, 0, 0, 0
    ");
    assert_eq!(out.stats.static_fields, 1);
}

#[test]
fn debug_mode_collects_symbols() {
    let program = adder();
    let engine = Engine::builder(&program).debug(true).build().unwrap();
    let out = engine.compile().unwrap();
    let code = out.text("kernel").code;

    assert!(code.contains(indoc! {"
        DebugStub_Step:
            int3
            ret
    "}));
    assert!(code.contains("    ; ldarg.0\n"));
    assert!(!out.symbols.is_empty());

    let init = "System_DVoid_SApp_DKernel_DInit_L_R";
    let depths: Vec<_> = out
        .symbols
        .iter()
        .filter(|s| s.method_label == init)
        .map(|s| (s.il_offset, s.stack_depth))
        .collect();
    assert_eq!(depths, [(0, 0), (1, 1), (2, 2), (3, 1), (4, 0)]);

    let file = SymbolFile::from_bytes(out.symbol_file().unwrap()).unwrap();
    assert_eq!(file.len(), out.symbols.len());
}

#[test]
fn release_mode_has_no_symbols() {
    let program = adder();
    let out = Engine::builder(&program).build().unwrap().compile().unwrap();
    let code = out.text("kernel").code;

    assert!(out.symbols.is_empty());
    assert!(out.symbol_file().is_none());
    assert!(!code.contains(naming::DEBUG_STUB_LABEL));
}

#[test]
fn binary_output_starts_at_the_entry_point() {
    let program = adder();
    let out = Engine::builder(&program)
        .output(OutputKind::Binary)
        .origin(0x8000)
        .build()
        .unwrap()
        .compile()
        .unwrap();

    let image = out.image.unwrap();
    assert_eq!(image.origin, 0x8000);
    assert_eq!(image.address_of(naming::ENTRY_POINT_LABEL), Some(0x8000));
    // call rel32
    assert_eq!(image.bytes[0], 0xE8);
    let exception = image.address_of(naming::CURRENT_EXCEPTION_LABEL).unwrap();
    assert_eq!(exception % 4, 0);
    assert_eq!(image.bytes.len() as u32, exception + 4 - 0x8000);
}

#[test]
fn assembly_output_has_no_image() {
    let program = adder();
    let out = Engine::builder(&program).build().unwrap().compile().unwrap();

    assert!(out.image.is_none());
}

#[test]
fn check_matches_compile() {
    let program = adder();
    let engine = Engine::builder(&program).threads(4).build().unwrap();

    let stats = engine.check().unwrap();
    let out = engine.compile().unwrap();

    assert_eq!(stats, out.stats);
    assert_eq!(stats.methods, 13);
}

#[test]
fn progress_reports_every_step() {
    let program = adder();
    let methods = Arc::new(Mutex::new(Vec::new()));
    let fields = Arc::new(Mutex::new(Vec::new()));
    let (m, f) = (methods.clone(), fields.clone());

    let out = Engine::builder(&program)
        .on_compiling_methods(move |current, total| m.lock().push((current, total)))
        .on_compiling_static_fields(move |current, total| f.lock().push((current, total)))
        .build()
        .unwrap()
        .compile()
        .unwrap();

    let methods = methods.lock();
    assert_eq!(methods.len(), out.stats.methods + 1);
    assert_eq!(methods.first(), Some(&(0, 13)));
    assert_eq!(methods.last(), Some(&(13, 13)));
    assert_eq!(*fields.lock(), [(0, 0)]);
}

#[test]
fn json_image_on_disk_compiles_like_the_built_one() {
    let program = adder();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.json");
    std::fs::write(&path, program.to_json().unwrap()).unwrap();

    let image: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(image["types"][program.entry_type.index()]["name"], "Kernel");

    let loaded = Program::from_path(&path).unwrap();
    let built = Engine::builder(&program).build().unwrap().compile().unwrap();
    let reloaded = Engine::builder(&loaded).build().unwrap().compile().unwrap();

    assert_eq!(reloaded.stats, built.stats);
    assert_eq!(reloaded.text("kernel").code, built.text("kernel").code);
}

#[test]
fn invalid_options_are_rejected() {
    let program = adder();

    let err = Engine::builder(&program)
        .options(CompileOptions::new().threads(0))
        .build()
        .err()
        .unwrap();
    insta::assert_snapshot!(err, @"invalid options: at least one scan thread is required");

    let err = Engine::builder(&program).origin(0x8002).build().err().unwrap();
    insta::assert_snapshot!(err, @"invalid options: origin 0x8002 is not 4-byte aligned");
}

#[test]
fn target_platforms_by_name() {
    assert_eq!("x86".parse::<Target>().unwrap(), Target::X86);
    assert_eq!("I686".parse::<Target>().unwrap(), Target::X86);
    assert_eq!(Target::default().to_string(), "x86");

    let err = "arm".parse::<Target>().unwrap_err();
    insta::assert_snapshot!(err, @"invalid options: unsupported target platform `arm`");
}

#[test]
fn explicit_target_compiles_like_the_default() {
    let program = adder();
    let default = Engine::builder(&program).build().unwrap().compile().unwrap();
    let engine = Engine::builder(&program)
        .options(CompileOptions::new().target(Target::X86))
        .build()
        .unwrap();

    assert_eq!(engine.options().target, Target::X86);
    let out = engine.compile().unwrap();
    assert_eq!(out.text("kernel").code, default.text("kernel").code);
}

#[test]
fn value_type_construction_is_unsupported() {
    let mut b = ProgramBuilder::new();
    let point = b.value_type("App.Point");
    let ctor = b.method(MethodDef {
        is_static: false,
        body: Some(code(vec![op(Ret)])),
        ..def(point, ".ctor")
    });
    b.entry(code(vec![(Newobj, Operand::Method(ctor)), op(Pop), op(Ret)]));
    let program = b.build();

    let err = Engine::builder(&program).build().unwrap().compile().unwrap_err();

    assert!(matches!(err, Error::Unsupported { op: Newobj, .. }));
}
