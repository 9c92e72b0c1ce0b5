//! Synthetic program images for tests.
//!
//! [`ProgramBuilder::new`] starts from a minimal corlib (`System.Object`,
//! `System.Int32`, `System.Int64`, `System.Byte`, `System.Boolean`,
//! `System.String`, `System.Array`), an `App.Runtime` type holding trivial
//! runtime hooks, and the empty entry type `App.Kernel`.

use ilaot_asm::Assembler;
use ilaot_core::{
    ExceptionHandler, FieldDef, FieldId, HandlerKind, ImplKind, Instruction, Interner,
    LayoutKind, MethodBody, MethodDef, MethodId, OpCode, Operand, ParamDef, Plugs, Program,
    RuntimeHooks, TypeDef, TypeId, TypeKind, TypeShape, Visibility,
};

use crate::Result;
use crate::method_info::resolve_method;
use crate::ops::{OpCodeMap, OpContext, StackModel};
use crate::plugs::PlugTable;
use crate::scanner::Scanner;
use crate::session::Session;

pub struct ProgramBuilder {
    types: Vec<TypeDef>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    pub plugs: Plugs,
    hooks: Option<RuntimeHooks>,
    pub object: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub boolean: TypeId,
    pub byte: TypeId,
    pub string: TypeId,
    pub array: TypeId,
    pub runtime: TypeId,
    pub kernel: TypeId,
}

/// A static, void, body-less method named `name` on `declaring`.
pub fn def(declaring: TypeId, name: &str) -> MethodDef {
    MethodDef {
        name: name.to_owned(),
        declaring,
        params: Vec::new(),
        return_type: None,
        is_static: true,
        is_virtual: false,
        is_abstract: false,
        is_final: false,
        visibility: Visibility::Public,
        implementation: ImplKind::Managed,
        custom_assembler: None,
        non_debuggable: false,
        body: None,
        token: 0,
    }
}

pub fn param(ty: TypeId) -> ParamDef {
    ParamDef {
        name: String::new(),
        ty,
        is_in: false,
        is_out: false,
    }
}

/// Body with one instruction per IL offset, starting at 0.
pub fn code(ops: Vec<(OpCode, Operand)>) -> MethodBody {
    MethodBody {
        locals: Vec::new(),
        instructions: ops
            .into_iter()
            .enumerate()
            .map(|(i, (op, operand))| Instruction::new(i as u32, op, operand))
            .collect(),
        handlers: Vec::new(),
    }
}

pub fn op(op: OpCode) -> (OpCode, Operand) {
    (op, Operand::None)
}

pub fn catch(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> ExceptionHandler {
    ExceptionHandler {
        kind: HandlerKind::Catch,
        try_start,
        try_end,
        handler_start,
        handler_end,
        filter_start: None,
        catch_type: None,
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        let mut b = Self {
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            plugs: Plugs::default(),
            hooks: None,
            object: TypeId(0),
            int32: TypeId(0),
            int64: TypeId(0),
            boolean: TypeId(0),
            byte: TypeId(0),
            string: TypeId(0),
            array: TypeId(0),
            runtime: TypeId(0),
            kernel: TypeId(0),
        };
        b.object = b.add_type("System.Object", TypeKind::Class, None);
        b.int32 = b.add_type("System.Int32", TypeKind::ValueType, Some(b.object));
        b.int64 = b.add_type("System.Int64", TypeKind::ValueType, Some(b.object));
        b.boolean = b.add_type("System.Boolean", TypeKind::ValueType, Some(b.object));
        b.byte = b.add_type("System.Byte", TypeKind::ValueType, Some(b.object));
        b.string = b.class("System.String", b.object);
        b.array = b.class("System.Array", b.object);
        b.runtime = b.class("App.Runtime", b.object);
        b.kernel = b.class("App.Kernel", b.object);

        let (int32, boolean, object, runtime) = (b.int32, b.boolean, b.object, b.runtime);
        let mut hook = |name: &str, params: &[TypeId], ret: Option<TypeId>| {
            let body = match ret {
                None => code(vec![op(OpCode::Ret)]),
                Some(_) => code(vec![op(OpCode::LdcI40), op(OpCode::Ret)]),
            };
            b.method(MethodDef {
                params: params.iter().copied().map(param).collect(),
                return_type: ret,
                body: Some(body),
                ..def(runtime, name)
            })
        };
        let hooks = RuntimeHooks {
            initialize_application: hook("InitializeApplication", &[], None),
            finalize_application: hook("FinalizeApplication", &[int32], None),
            print_exception: hook("PrintException", &[], None),
            load_type_table: hook("LoadTypeTable", &[int32], None),
            set_method_info: hook("SetMethodInfo", &[int32, int32, int32, int32], None),
            is_instance: hook("IsInstance", &[object, int32], Some(boolean)),
            set_type_info: hook("SetTypeInfo", &[int32, int32, int32], None),
            get_method_address_for_type: hook("GetMethodAddressForType", &[int32, int32], Some(int32)),
            inc_ref_count: hook("IncRefCount", &[object], None),
            dec_ref_count: hook("DecRefCount", &[object], None),
            alloc_new_object: hook("AllocNewObject", &[int32], Some(int32)),
            heap_alloc: hook("HeapAlloc", &[int32], Some(int32)),
        };
        b.hooks = Some(hooks);
        b
    }

    pub fn add_type(&mut self, full_name: &str, kind: TypeKind, base: Option<TypeId>) -> TypeId {
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            assembly: "app".to_owned(),
            kind,
            shape: TypeShape::Named,
            base,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            layout: LayoutKind::Auto,
            explicit_size: None,
            interface_map: Vec::new(),
            token: 0x0200_0001 + id.0,
        });
        id
    }

    pub fn class(&mut self, full_name: &str, base: TypeId) -> TypeId {
        self.add_type(full_name, TypeKind::Class, Some(base))
    }

    pub fn value_type(&mut self, full_name: &str) -> TypeId {
        let object = self.object;
        self.add_type(full_name, TypeKind::ValueType, Some(object))
    }

    pub fn interface(&mut self, full_name: &str) -> TypeId {
        self.add_type(full_name, TypeKind::Interface, None)
    }

    pub fn array_of(&mut self, element: TypeId, rank: u32) -> TypeId {
        let name = format!("{}[{}]", self.types[element.index()].full_name(), ",".repeat(rank as usize - 1));
        let id = self.add_type(&name, TypeKind::Class, None);
        self.types[id.index()].shape = TypeShape::Array { element, rank };
        id
    }

    pub fn implement(&mut self, ty: TypeId, interface: TypeId) {
        self.types[ty.index()].interfaces.push(interface);
    }

    pub fn ty_mut(&mut self, ty: TypeId) -> &mut TypeDef {
        &mut self.types[ty.index()]
    }

    pub fn field(&mut self, declaring: TypeId, name: &str, ty: TypeId) -> FieldId {
        self.push_field(declaring, name, ty, false)
    }

    pub fn static_field(&mut self, declaring: TypeId, name: &str, ty: TypeId) -> FieldId {
        self.push_field(declaring, name, ty, true)
    }

    fn push_field(&mut self, declaring: TypeId, name: &str, ty: TypeId, is_static: bool) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            name: name.to_owned(),
            declaring,
            field_type: ty,
            is_static,
            offset: None,
            token: 0x0400_0001 + id.0,
        });
        self.types[declaring.index()].fields.push(id);
        id
    }

    pub fn field_mut(&mut self, field: FieldId) -> &mut FieldDef {
        &mut self.fields[field.index()]
    }

    pub fn method(&mut self, mut def: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        if def.token == 0 {
            def.token = 0x0600_0001 + id.0;
        }
        self.types[def.declaring.index()].methods.push(id);
        self.methods.push(def);
        id
    }

    /// `App.Kernel.Init()` with the given body.
    pub fn entry(&mut self, body: MethodBody) -> MethodId {
        let kernel = self.kernel;
        self.method(MethodDef {
            body: Some(body),
            ..def(kernel, "Init")
        })
    }

    /// Add `def` together with an entry point that calls it, so a scan
    /// reaches it.
    pub fn called(&mut self, def: MethodDef) -> MethodId {
        let id = self.method(def);
        self.entry(code(vec![(OpCode::Call, Operand::Method(id)), op(OpCode::Ret)]));
        id
    }

    pub fn hooks(&self) -> &RuntimeHooks {
        self.hooks.as_ref().unwrap()
    }

    pub fn build(self) -> Program {
        Program::new(
            self.kernel,
            self.types,
            self.fields,
            self.methods,
            self.hooks.unwrap(),
            self.plugs,
        )
        .unwrap()
    }
}

/// Session with plug tables installed.
pub fn session(program: &Program) -> Session<'_> {
    let session = Session::new(program, false);
    session.init_plugs(PlugTable::build(program).unwrap()).unwrap();
    session
}

/// Run reachability to the fixpoint with `threads` workers.
pub fn scanned(program: &Program, threads: usize) -> Session<'_> {
    let session = session(program);
    let map = OpCodeMap::x86();
    Scanner::new(&session, &map).threads(threads).run().unwrap();
    session
}

/// Ordinal the scan of `program` gives `ty`.
pub fn type_ordinal(program: &Program, ty: TypeId) -> usize {
    scanned(program, 1).register_type(ty).unwrap()
}

/// Code items as NASM lines, without the file prologue and data include.
pub fn listing(asm: &Assembler) -> String {
    let text = ilaot_asm::text::render_code(asm.code(), "");
    let mut out = String::new();
    for line in text.lines().skip(2).take_while(|line| !line.is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Scan `program`, then run the assemble step of every instruction of
/// `method` the way code generation does, under the method label `T` and
/// without header or footer. Returns the listing and the final stack.
pub fn assemble(program: &Program, method: MethodId) -> Result<(String, StackModel)> {
    let session = scanned(program, 1);
    let map = OpCodeMap::x86();
    let m = program.method(method)?;
    let type_info = if m.is_instance() {
        Some(session.layouts().resolve_fields(m.declaring)?)
    } else {
        None
    };
    let data = session.method_data(method);
    let info = resolve_method(&session, method, method, "T", type_info, false, &data)?;
    let body = m.body.as_ref().unwrap();

    let mut asm = Assembler::new();
    let mut strings = Interner::new();
    let mut ctx = OpContext::new(&session, &mut asm, &mut strings, &info, &data, body);
    let mut falls_through = true;
    for (index, instr) in body.instructions.iter().enumerate() {
        ctx.enter(index, falls_through);
        let label = ctx.label();
        ctx.asm.label(label);
        (map.handler(instr.op)?.assemble)(&mut ctx, instr)?;
        falls_through = !matches!(
            instr.op,
            OpCode::Br
                | OpCode::BrS
                | OpCode::Leave
                | OpCode::LeaveS
                | OpCode::Ret
                | OpCode::Throw
                | OpCode::Endfinally
        );
    }
    let stack = ctx.stack.clone();
    Ok((listing(&asm), stack))
}
