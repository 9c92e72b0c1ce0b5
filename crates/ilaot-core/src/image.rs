//! Program image: flat metadata tables plus method bodies.
//!
//! Every cross reference is an index into one of the three tables. The
//! image is read from JSON or from its postcard-encoded binary form.

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::opcode::OpCode;
use crate::{ImageError, Result};

macro_rules! table_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

table_id!(
    /// Index into [`Program::types`].
    TypeId
);
table_id!(
    /// Index into [`Program::fields`].
    FieldId
);
table_id!(
    /// Index into [`Program::methods`].
    MethodId
);

pub const OBJECT_TYPE: &str = "System.Object";
pub const ARRAY_TYPE: &str = "System.Array";
pub const VOID_TYPE: &str = "System.Void";
pub const STRING_TYPE: &str = "System.String";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    ValueType,
    Interface,
    Enum,
}

/// Structural shape of a type. Constructed shapes point at their element type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeShape {
    #[default]
    Named,
    Array { element: TypeId, rank: u32 },
    Pointer { element: TypeId },
    ByRef { element: TypeId },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Auto,
    Sequential,
    Explicit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Family,
    Assembly,
    FamilyAndAssembly,
    FamilyOrAssembly,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplKind {
    #[default]
    Managed,
    Pinvoke,
    InternalCall,
}

/// Methods whose whole body is a fixed instruction sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomAssembler {
    Halt,
    DisableInterrupts,
    EnableInterrupts,
    DebugBreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceImpl {
    pub interface_method: MethodId,
    pub implementation: MethodId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub assembly: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub shape: TypeShape,
    #[serde(default)]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub interfaces: Vec<TypeId>,
    #[serde(default)]
    pub fields: Vec<FieldId>,
    #[serde(default)]
    pub methods: Vec<MethodId>,
    #[serde(default)]
    pub layout: LayoutKind,
    #[serde(default)]
    pub explicit_size: Option<u32>,
    #[serde(default)]
    pub interface_map: Vec<InterfaceImpl>,
    #[serde(default)]
    pub token: u32,
}

impl TypeDef {
    /// `Namespace.Name`, or `Name` for the global namespace.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::ValueType | TypeKind::Enum)
            && matches!(self.shape, TypeShape::Named)
    }

    /// Whether a storage slot of this type holds an object reference.
    pub fn is_reference(&self) -> bool {
        match self.shape {
            TypeShape::Array { .. } => true,
            TypeShape::Pointer { .. } | TypeShape::ByRef { .. } => false,
            TypeShape::Named => matches!(self.kind, TypeKind::Class | TypeKind::Interface),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub declaring: TypeId,
    pub field_type: TypeId,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub offset: Option<i32>,
    #[serde(default)]
    pub token: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub is_in: bool,
    #[serde(default)]
    pub is_out: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub declaring: TypeId,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    /// `None` for `System.Void`.
    #[serde(default)]
    pub return_type: Option<TypeId>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub implementation: ImplKind,
    #[serde(default)]
    pub custom_assembler: Option<CustomAssembler>,
    #[serde(default)]
    pub non_debuggable: bool,
    #[serde(default)]
    pub body: Option<MethodBody>,
    #[serde(default)]
    pub token: u32,
}

impl MethodDef {
    pub fn is_ctor(&self) -> bool {
        self.name == ".ctor"
    }

    pub fn is_cctor(&self) -> bool {
        self.name == ".cctor"
    }

    pub fn is_instance(&self) -> bool {
        !self.is_static
    }

    pub fn param_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.params.iter().map(|p| p.ty)
    }

    pub fn same_params(&self, other: &MethodDef) -> bool {
        self.param_types().eq(other.param_types())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    #[serde(default)]
    pub locals: Vec<TypeId>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub handlers: Vec<ExceptionHandler>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub op: OpCode,
    #[serde(default)]
    pub operand: Operand,
}

impl Instruction {
    pub fn new(offset: u32, op: OpCode, operand: Operand) -> Self {
        Self {
            offset,
            op,
            operand,
        }
    }
}

/// Inline operand of an instruction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    #[default]
    None,
    Int(i32),
    Long(i64),
    Single(f32),
    Double(f64),
    String(String),
    Type(TypeId),
    Field(FieldId),
    Method(MethodId),
    /// Absolute IL offset of a branch target.
    Target(u32),
    Switch(Vec<u32>),
    Local(u16),
    Arg(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Catch,
    Finally,
    Fault,
    Filter,
}

/// One exception clause. Spans are half-open IL offset ranges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: u32,
    pub try_end: u32,
    pub handler_start: u32,
    pub handler_end: u32,
    #[serde(default)]
    pub filter_start: Option<u32>,
    #[serde(default)]
    pub catch_type: Option<TypeId>,
}

/// Runtime services the generated code calls into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHooks {
    pub initialize_application: MethodId,
    pub finalize_application: MethodId,
    pub print_exception: MethodId,
    pub load_type_table: MethodId,
    pub set_method_info: MethodId,
    pub is_instance: MethodId,
    pub set_type_info: MethodId,
    pub get_method_address_for_type: MethodId,
    pub inc_ref_count: MethodId,
    pub dec_ref_count: MethodId,
    pub alloc_new_object: MethodId,
    pub heap_alloc: MethodId,
}

impl RuntimeHooks {
    /// Hooks queued before the entry point, in queue order.
    pub fn bootstrap(&self) -> [MethodId; 11] {
        [
            self.initialize_application,
            self.finalize_application,
            self.print_exception,
            self.load_type_table,
            self.set_method_info,
            self.is_instance,
            self.set_type_info,
            self.get_method_address_for_type,
            self.inc_ref_count,
            self.dec_ref_count,
            self.alloc_new_object,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodPlug {
    pub target: MethodId,
    pub replacement: MethodId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlug {
    pub declaring: TypeId,
    /// Full name (`Declaring.Type.name`) of the field this plug stands for.
    pub field_id: String,
    pub field_type: TypeId,
    #[serde(default)]
    pub is_external: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugs {
    #[serde(default)]
    pub methods: Vec<MethodPlug>,
    #[serde(default)]
    pub fields: Vec<FieldPlug>,
}

/// A whole program, ready to compile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub entry_type: TypeId,
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    pub runtime: RuntimeHooks,
    #[serde(default)]
    pub plugs: Plugs,
    #[serde(skip)]
    type_index: IndexMap<String, TypeId>,
}

impl Program {
    pub fn new(
        entry_type: TypeId,
        types: Vec<TypeDef>,
        fields: Vec<FieldDef>,
        methods: Vec<MethodDef>,
        runtime: RuntimeHooks,
        plugs: Plugs,
    ) -> Result<Self> {
        let mut program = Self {
            entry_type,
            types,
            fields,
            methods,
            runtime,
            plugs,
            type_index: IndexMap::new(),
        };
        program.reindex()?;
        Ok(program)
    }

    pub fn from_json(src: &str) -> Result<Self> {
        let mut program: Program = serde_json::from_str(src)?;
        program.reindex()?;
        Ok(program)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        let mut program: Program = postcard::from_bytes(bytes)?;
        program.reindex()?;
        Ok(program)
    }

    pub fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Load from a file: `.ilimg` files are binary, anything else is JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        if path.extension().is_some_and(|ext| ext == "ilimg") {
            return Self::from_binary(&bytes);
        }
        let text = String::from_utf8_lossy(&bytes);
        Self::from_json(&text)
    }

    /// Rebuild the name index. Must be called after editing `types`.
    pub fn reindex(&mut self) -> Result<()> {
        self.type_index.clear();
        for (i, td) in self.types.iter().enumerate() {
            let name = td.full_name();
            if self.type_index.contains_key(&name) {
                return Err(ImageError::DuplicateType(name));
            }
            self.type_index.insert(name, TypeId(i as u32));
        }
        Ok(())
    }

    pub fn ty(&self, id: TypeId) -> Result<&TypeDef> {
        self.types
            .get(id.index())
            .ok_or(ImageError::UnresolvedType(id.0))
    }

    pub fn field(&self, id: FieldId) -> Result<&FieldDef> {
        self.fields
            .get(id.index())
            .ok_or(ImageError::UnresolvedField(id.0))
    }

    pub fn method(&self, id: MethodId) -> Result<&MethodDef> {
        self.methods
            .get(id.index())
            .ok_or(ImageError::UnresolvedMethod(id.0))
    }

    pub fn type_by_name(&self, full_name: &str) -> Option<TypeId> {
        self.type_index.get(full_name).copied()
    }

    pub fn require_type(&self, full_name: &str) -> Result<TypeId> {
        self.type_by_name(full_name)
            .ok_or_else(|| ImageError::TypeNotFound(full_name.to_owned()))
    }

    pub fn type_name(&self, id: TypeId) -> Result<String> {
        Ok(self.ty(id)?.full_name())
    }

    fn return_type_name(&self, ret: Option<TypeId>) -> Result<String> {
        match ret {
            Some(id) => self.type_name(id),
            None => Ok(VOID_TYPE.to_owned()),
        }
    }

    /// Display signature: `{ret} {Declaring.Type}.{name}({p1}, {p2})`.
    pub fn method_signature(&self, id: MethodId) -> Result<String> {
        let m = self.method(id)?;
        let mut out = self.return_type_name(m.return_type)?;
        out.push(' ');
        out.push_str(&self.type_name(m.declaring)?);
        out.push('.');
        out.push_str(&m.name);
        out.push('(');
        for (i, p) in m.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.type_name(p.ty)?);
        }
        out.push(')');
        Ok(out)
    }

    /// `Declaring.Type.name`.
    pub fn field_full_name(&self, id: FieldId) -> Result<String> {
        let f = self.field(id)?;
        let mut out = self.type_name(f.declaring)?;
        let _ = write!(out, ".{}", f.name);
        Ok(out)
    }

    /// The type followed by its base types, most-derived first.
    pub fn base_chain(&self, id: TypeId) -> Result<Vec<TypeId>> {
        let mut chain = vec![id];
        let mut current = self.ty(id)?.base;
        while let Some(base) = current {
            if chain.contains(&base) {
                return Err(ImageError::InheritanceCycle(self.type_name(base)?));
            }
            chain.push(base);
            current = self.ty(base)?.base;
        }
        Ok(chain)
    }

    /// Base types only, nearest first.
    pub fn ancestors(&self, id: TypeId) -> Result<Vec<TypeId>> {
        let mut chain = self.base_chain(id)?;
        chain.remove(0);
        Ok(chain)
    }

    pub fn is_subtype_of(&self, id: TypeId, base: TypeId) -> Result<bool> {
        Ok(self.base_chain(id)?.contains(&base))
    }

    /// Method declared on `ty` itself with the given name and parameter types.
    pub fn find_method(&self, ty: TypeId, name: &str, params: &[TypeId]) -> Result<Option<MethodId>> {
        for &id in &self.ty(ty)?.methods {
            let m = self.method(id)?;
            if m.name == name && m.param_types().eq(params.iter().copied()) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// The zero-parameter `Init` method of the entry type.
    pub fn entry_point(&self) -> Result<MethodId> {
        match self.find_method(self.entry_type, "Init", &[])? {
            Some(id) => Ok(id),
            None => Err(ImageError::EntryPointNotFound(
                self.type_name(self.entry_type)?,
            )),
        }
    }

    /// Interfaces implemented by `ty`, directly, through base types or through
    /// inherited interfaces.
    pub fn implemented_interfaces(&self, ty: TypeId) -> Result<Vec<TypeId>> {
        let mut out: Vec<TypeId> = Vec::new();
        let mut pending: Vec<TypeId> = Vec::new();
        for t in self.base_chain(ty)? {
            pending.extend(self.ty(t)?.interfaces.iter().copied());
        }
        while let Some(iface) = pending.pop() {
            if out.contains(&iface) {
                continue;
            }
            out.push(iface);
            pending.extend(self.ty(iface)?.interfaces.iter().copied());
        }
        Ok(out)
    }

    /// Element type of arrays, pointers and by-refs.
    pub fn element_of(&self, id: TypeId) -> Result<Option<TypeId>> {
        Ok(match self.ty(id)?.shape {
            TypeShape::Named => None,
            TypeShape::Array { element, .. }
            | TypeShape::Pointer { element }
            | TypeShape::ByRef { element } => Some(element),
        })
    }

    pub fn op_count(&self) -> usize {
        self.methods
            .iter()
            .filter_map(|m| m.body.as_ref())
            .map(|b| b.instructions.len())
            .sum()
    }
}

#[cfg(test)]
impl Program {
    pub(crate) fn indexed_names(&self) -> Vec<&str> {
        self.type_index.keys().map(String::as_str).collect()
    }
}
