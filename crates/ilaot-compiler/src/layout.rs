//! Object layout: storage sizes and instance field offsets.
//!
//! Every heap object starts with a fixed header:
//!
//! ```text
//! [+0]  type id
//! [+4]  instance kind (INSTANCE_NORMAL, BOXED_VALUE_TYPE, INSTANCE_ARRAY)
//! [+8]  reference count, or the element count for arrays
//! [+12] first field, or the element size for arrays
//! [+16] first array element
//! ```

use indexmap::{IndexMap, IndexSet};

use ilaot_core::{LayoutKind, Program, TypeId, TypeKind, TypeShape};

use crate::Result;
use crate::plugs::PlugTable;

pub const FIELD_DATA_OFFSET: u32 = 12;
pub const ARRAY_COUNT_OFFSET: u32 = 8;
pub const ARRAY_ELEMENT_SIZE_OFFSET: u32 = 12;
pub const ARRAY_DATA_OFFSET: u32 = 16;

pub const INSTANCE_NORMAL: i32 = 1;
pub const BOXED_VALUE_TYPE: i32 = 2;
pub const INSTANCE_ARRAY: i32 = 3;

/// One instance field slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    /// Offset from the start of the field data.
    pub offset: u32,
    pub size: u32,
    pub is_reference: bool,
    pub field_type: TypeId,
    pub is_external: bool,
}

/// Instance layout of a type, keyed by field full name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeInfo {
    pub storage_size: u32,
    pub fields: IndexMap<String, FieldInfo>,
}

impl TypeInfo {
    pub fn field(&self, full_name: &str) -> Option<&FieldInfo> {
        self.fields.get(full_name)
    }
}

pub fn round4(size: u32) -> u32 {
    (size + 3) & !3
}

fn primitive_size(full_name: &str) -> Option<u32> {
    Some(match full_name {
        "System.Void" => 0,
        "System.Byte" | "System.SByte" | "System.Boolean" => 1,
        "System.Char" | "System.Int16" | "System.UInt16" => 2,
        "System.Int32" | "System.UInt32" | "System.IntPtr" | "System.UIntPtr" | "System.Single" => 4,
        "System.Int64" | "System.UInt64" | "System.Double" | "System.DateTime" => 8,
        "System.Decimal" | "System.Guid" => 16,
        _ => return None,
    })
}

/// Whether loads of a narrow value of this type sign-extend.
pub fn is_signed(full_name: &str) -> bool {
    matches!(full_name, "System.SByte" | "System.Int16")
}

pub fn is_float(full_name: &str) -> bool {
    matches!(full_name, "System.Single" | "System.Double")
}

struct PendingField {
    id: String,
    ty: TypeId,
    explicit_offset: Option<i32>,
    is_external: bool,
}

/// Layout queries over a program and its field plugs.
#[derive(Clone, Copy)]
pub struct Layouts<'a> {
    program: &'a Program,
    plugs: Option<&'a PlugTable>,
}

impl<'a> Layouts<'a> {
    pub fn new(program: &'a Program, plugs: Option<&'a PlugTable>) -> Self {
        Self { program, plugs }
    }

    /// Bytes a value of `ty` occupies in a field, local or argument slot.
    pub fn storage_size(&self, ty: TypeId) -> Result<u32> {
        let td = self.program.ty(ty)?;
        if !matches!(td.shape, TypeShape::Named) {
            return Ok(4);
        }
        let name = td.full_name();
        if let Some(size) = primitive_size(&name) {
            return Ok(size);
        }
        if name.ends_with('*') || name.ends_with('&') {
            return Ok(4);
        }
        match td.kind {
            TypeKind::Class | TypeKind::Interface => Ok(4),
            TypeKind::Enum => {
                for &id in &td.fields {
                    let field = self.program.field(id)?;
                    if !field.is_static && field.name == "value__" {
                        return self.storage_size(field.field_type);
                    }
                }
                Ok(4)
            }
            TypeKind::ValueType => match td.explicit_size {
                Some(size) if size != 0 => Ok(size),
                _ => Ok(self.resolve_fields(ty)?.storage_size),
            },
        }
    }

    /// Slot size rounded up to whole stack words.
    pub fn stack_size(&self, ty: TypeId) -> Result<u32> {
        Ok(round4(self.storage_size(ty)?))
    }

    /// Instance fields of `ty` and its base types, base-first.
    pub fn resolve_fields(&self, ty: TypeId) -> Result<TypeInfo> {
        let mut claimed: IndexSet<String> = IndexSet::new();
        let mut per_type: Vec<Vec<PendingField>> = Vec::new();

        for t in self.program.base_chain(ty)? {
            let mut plugs: Vec<_> = self
                .plugs
                .map(|p| p.field_plugs(t).to_vec())
                .unwrap_or_default();
            let mut fields = Vec::new();

            for &id in &self.program.ty(t)?.fields {
                let def = self.program.field(id)?;
                if def.is_static {
                    continue;
                }
                let full_name = self.program.field_full_name(id)?;
                let mut pending = PendingField {
                    id: full_name,
                    ty: def.field_type,
                    explicit_offset: def.offset,
                    is_external: false,
                };
                if let Some(pos) = plugs.iter().position(|p| p.field_id == pending.id) {
                    let plug = plugs.remove(pos);
                    pending.ty = plug.field_type;
                    pending.is_external = plug.is_external;
                }
                fields.push(pending);
            }
            fields.extend(plugs.into_iter().map(|plug| PendingField {
                id: plug.field_id,
                ty: plug.field_type,
                explicit_offset: None,
                is_external: plug.is_external,
            }));

            fields.retain(|f| claimed.insert(f.id.clone()));
            per_type.push(fields);
        }

        let mut info = TypeInfo::default();
        let mut offset = 0u32;
        let mut extent = 0u32;
        for pending in per_type.into_iter().rev().flatten() {
            let size = if pending.is_external {
                4
            } else {
                self.storage_size(pending.ty)?
            };
            let at = match pending.explicit_offset {
                Some(explicit) => explicit.max(0) as u32,
                None => {
                    let at = offset;
                    offset += size;
                    at
                }
            };
            extent = extent.max(at + size);
            let is_reference = !pending.is_external && self.program.ty(pending.ty)?.is_reference();
            info.fields.insert(
                pending.id,
                FieldInfo {
                    offset: at,
                    size,
                    is_reference,
                    field_type: pending.ty,
                    is_external: pending.is_external,
                },
            );
        }

        let td = self.program.ty(ty)?;
        info.storage_size = if td.layout == LayoutKind::Explicit {
            match td.explicit_size {
                Some(size) if size != 0 => size,
                _ => extent,
            }
        } else {
            offset
        };
        Ok(info)
    }
}
