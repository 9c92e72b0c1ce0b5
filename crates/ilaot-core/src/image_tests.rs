use indoc::indoc;

use crate::image::{FieldId, MethodId, TypeId};
use crate::{ImageError, OpCode, Operand, Program, TypeShape};

const SAMPLE: &str = indoc! {r#"
    {
      "entry_type": 2,
      "types": [
        { "name": "Object", "namespace": "System", "assembly": "mscorlib" },
        { "name": "Int32", "namespace": "System", "kind": "value_type", "base": 0 },
        { "name": "Kernel", "namespace": "App", "base": 0, "fields": [0], "methods": [0, 1] },
        { "name": "Int32[]", "namespace": "System", "shape": { "array": { "element": 1, "rank": 1 } } }
      ],
      "fields": [
        { "name": "count", "declaring": 2, "field_type": 1 }
      ],
      "methods": [
        {
          "name": "Init",
          "declaring": 2,
          "is_static": true,
          "body": {
            "instructions": [
              { "offset": 0, "op": "ldc.i4.s", "operand": { "int": 7 } },
              { "offset": 2, "op": "pop" },
              { "offset": 3, "op": "ret" }
            ]
          }
        },
        {
          "name": "Add",
          "declaring": 2,
          "params": [ { "name": "a", "ty": 1 }, { "name": "b", "ty": 3 } ],
          "return_type": 1
        }
      ],
      "runtime": {
        "initialize_application": 0, "finalize_application": 0, "print_exception": 0,
        "load_type_table": 0, "set_method_info": 0, "is_instance": 0, "set_type_info": 0,
        "get_method_address_for_type": 0, "inc_ref_count": 0, "dec_ref_count": 0,
        "alloc_new_object": 0, "heap_alloc": 0
      }
    }
"#};

#[test]
fn parses_json_image() {
    let program = Program::from_json(SAMPLE).unwrap();

    assert_eq!(program.types.len(), 4);
    assert_eq!(
        program.indexed_names(),
        ["System.Object", "System.Int32", "App.Kernel", "System.Int32[]"]
    );
    assert_eq!(program.type_by_name("App.Kernel"), Some(TypeId(2)));
    assert_eq!(
        program.types[3].shape,
        TypeShape::Array {
            element: TypeId(1),
            rank: 1
        }
    );

    let body = program.methods[0].body.as_ref().unwrap();
    assert_eq!(body.instructions[0].op, OpCode::LdcI4S);
    assert_eq!(body.instructions[0].operand, Operand::Int(7));
    assert_eq!(body.instructions[1].operand, Operand::None);
    assert!(program.plugs.methods.is_empty());
}

#[test]
fn method_signature_text() {
    let program = Program::from_json(SAMPLE).unwrap();

    insta::assert_snapshot!(
        program.method_signature(MethodId(0)).unwrap(),
        @"System.Void App.Kernel.Init()"
    );
    insta::assert_snapshot!(
        program.method_signature(MethodId(1)).unwrap(),
        @"System.Int32 App.Kernel.Add(System.Int32, System.Int32[])"
    );
    assert_eq!(
        program.field_full_name(FieldId(0)).unwrap(),
        "App.Kernel.count"
    );
}

#[test]
fn entry_point_is_zero_arg_init() {
    let program = Program::from_json(SAMPLE).unwrap();
    assert_eq!(program.entry_point().unwrap(), MethodId(0));

    let mut program = program;
    program.methods[0].name = "Start".to_owned();
    let err = program.entry_point().unwrap_err();
    assert!(matches!(err, ImageError::EntryPointNotFound(ref name) if name == "App.Kernel"));
}

#[test]
fn lookups_out_of_range() {
    let program = Program::from_json(SAMPLE).unwrap();

    assert!(matches!(
        program.ty(TypeId(40)),
        Err(ImageError::UnresolvedType(40))
    ));
    assert!(matches!(
        program.field(FieldId(1)),
        Err(ImageError::UnresolvedField(1))
    ));
    assert!(matches!(
        program.method(MethodId(9)),
        Err(ImageError::UnresolvedMethod(9))
    ));
    assert!(matches!(
        program.require_type("App.Missing"),
        Err(ImageError::TypeNotFound(_))
    ));
}

#[test]
fn base_chain_and_cycle() {
    let mut program = Program::from_json(SAMPLE).unwrap();
    assert_eq!(program.base_chain(TypeId(2)).unwrap(), [TypeId(2), TypeId(0)]);
    assert_eq!(program.ancestors(TypeId(2)).unwrap(), [TypeId(0)]);
    assert!(program.is_subtype_of(TypeId(1), TypeId(0)).unwrap());

    program.types[0].base = Some(TypeId(2));
    assert!(matches!(
        program.base_chain(TypeId(2)),
        Err(ImageError::InheritanceCycle(_))
    ));
}

#[test]
fn duplicate_type_rejected() {
    let mut program = Program::from_json(SAMPLE).unwrap();
    program.types[3].name = "Int32".to_owned();

    let err = program.reindex().unwrap_err();
    insta::assert_snapshot!(err, @"type `System.Int32` is defined more than once");
}

#[test]
fn unknown_opcode_rejected() {
    let src = SAMPLE.replace("\"pop\"", "\"pop.twice\"");
    let err = Program::from_json(&src).unwrap_err();
    assert!(err.to_string().contains("unknown opcode `pop.twice`"));
}

#[test]
fn binary_file_roundtrip() {
    let program = Program::from_json(SAMPLE).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.ilimg");
    std::fs::write(&path, program.to_binary().unwrap()).unwrap();

    let loaded = Program::from_path(&path).unwrap();

    assert_eq!(loaded.types, program.types);
    assert_eq!(loaded.methods, program.methods);
    assert_eq!(loaded.type_by_name("System.Int32[]"), Some(TypeId(3)));
}

#[test]
fn json_file_loaded_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.json");
    std::fs::write(&path, SAMPLE).unwrap();

    let loaded = Program::from_path(&path).unwrap();
    assert_eq!(loaded.entry_type, TypeId(2));
}
