use crate::instruction::{DataItem, DataMember, Instr, Item};
use crate::register::Register;
use crate::Assembler;

#[test]
fn first_data_member_wins() {
    let mut asm = Assembler::new();

    assert!(asm.add_data(DataMember::new("s", vec![DataItem::Dword(1)])));
    assert!(!asm.add_data(DataMember::new("s", vec![DataItem::Dword(2)])));
    assert!(asm.has_data("s"));

    let out = asm.finish();
    assert_eq!(out.data.len(), 1);
    assert_eq!(out.data[0].items, [DataItem::Dword(1)]);
}

#[test]
fn append_keeps_order() {
    let mut main = Assembler::new();
    main.label("a");
    main.add_data(DataMember::zeroed("x", 4));

    let mut method = Assembler::new();
    method.label("b");
    method.emit(Instr::Nop);
    method.add_data(DataMember::zeroed("y", 8));
    method.add_data(DataMember::zeroed("x", 12));

    main.append(method);
    let out = main.finish();

    assert_eq!(
        out.code,
        [
            Item::Label("a".to_owned()),
            Item::Label("b".to_owned()),
            Item::Instr(Instr::Nop)
        ]
    );
    let names: Vec<_> = out.data.iter().map(|d| (d.name.as_str(), d.size())).collect();
    assert_eq!(names, [("x", 4), ("y", 8)]);
    assert_eq!(out.instruction_count(), 1);
}

#[test]
fn helpers_emit_instructions() {
    let mut asm = Assembler::new();
    asm.push(Register::Eax);
    asm.comment("note");
    asm.pop(Register::Ecx);

    assert_eq!(asm.code().len(), 3);
    assert_eq!(asm.code()[1], Item::Comment("note".to_owned()));
}
