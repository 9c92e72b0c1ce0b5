use indoc::indoc;

use crate::instruction::{AluOp, DataItem, DataMember, Instr, Mem, Operand, ShiftCount, ShiftOp, UnaryOp, Width};
use crate::register::{Condition, Register::*};
use crate::{Assembler, text};

fn sample() -> Assembler {
    let mut asm = Assembler::new();
    asm.label("main");
    asm.push(Ebp);
    asm.mov(Ebp, Esp);
    asm.push(Mem::at(Ebp, 8));
    asm.comment("load field");
    asm.mov(Eax, Mem::at(Esp, 0));
    asm.mov(Mem::at(Ebp, -4), 7);
    asm.push(Operand::addr("greeting"));
    asm.push(5);
    asm.call("helper");
    asm.emit(Instr::Ret(8));
    asm.add_data(DataMember::new(
        "greeting",
        vec![
            DataItem::Dword(3),
            DataItem::Bytes(vec![104, 105, 0]),
            DataItem::Address("main".to_owned()),
        ],
    ));
    asm
}

#[test]
fn renders_code_file() {
    let out = text::render(&sample().finish(), "kernel");

    assert_eq!(out.code_file, "kernel.asm");
    insta::assert_snapshot!(out.code, @r#"
    bits 32
    section .text
    main:
        push ebp
        mov ebp, esp
        push dword [ebp + 8]
        ; load field
        mov eax, dword [esp]
        mov dword [ebp - 4], 7
        push greeting
        push dword 5
        call helper
        ret 8

    %include "kernel.data.asm"
    "#);
}

#[test]
fn empty_program_still_includes_its_data() {
    let out = text::render(&Assembler::new().finish(), "boot");

    assert_eq!(
        out.code,
        indoc! {r#"
            bits 32
            section .text

            %include "boot.data.asm"
        "#}
    );
}

#[test]
fn renders_data_file() {
    let out = text::render(&sample().finish(), "kernel");

    assert_eq!(out.data_file, "kernel.data.asm");
    insta::assert_snapshot!(out.data, @r"
    section .data
    align 4
    greeting:
        dd 0x00000003
        db 104, 105, 0
        dd main
    ");
}

#[test]
fn renders_narrow_and_group_forms() {
    let cases = [
        (
            Instr::Store {
                dst: Mem::at(Eax, 2),
                src: Ecx,
                width: Width::Byte,
            },
            "mov byte [eax + 2], cl",
        ),
        (
            Instr::Store {
                dst: Mem::at(Eax, 0),
                src: Edx,
                width: Width::Word,
            },
            "mov word [eax], dx",
        ),
        (
            Instr::Movsx {
                dst: Eax,
                src: Operand::Mem(Mem::at(Esp, 0)),
                width: Width::Byte,
            },
            "movsx eax, byte [esp]",
        ),
        (
            Instr::Movzx {
                dst: Eax,
                src: Operand::Reg(Eax),
                width: Width::Byte,
            },
            "movzx eax, al",
        ),
        (Instr::Setcc(Condition::L, Eax), "setl al"),
        (Instr::Jcc(Condition::Ae, "x".to_owned()), "jae x"),
        (Instr::Shift(ShiftOp::Sar, Eax, ShiftCount::Cl), "sar eax, cl"),
        (Instr::Shift(ShiftOp::Shl, Edx, ShiftCount::Imm(3)), "shl edx, 3"),
        (Instr::Unary(UnaryOp::Neg, Operand::Mem(Mem::at(Esp, 0))), "neg dword [esp]"),
        (Instr::Alu(AluOp::Adc, Operand::Mem(Mem::at(Esp, 4)), Operand::Reg(Edx)), "adc dword [esp + 4], edx"),
        (Instr::Lea(Eax, Mem::label("table", 12)), "lea eax, [table + 12]"),
        (Instr::ImulImm(Eax, Operand::Reg(Eax), 8), "imul eax, eax, 8"),
        (Instr::Ret(0), "ret"),
    ];
    for (instr, expected) in cases {
        assert_eq!(instr.to_string(), expected);
    }
}

#[test]
fn long_byte_runs_wrap() {
    let data = text::render_data(&[DataMember::zeroed("buf", 18)]);
    insta::assert_snapshot!(data, @r"
    section .data
    align 4
    buf:
        db 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0
        db 0, 0
    ");
}
