//! Method and field replacements carried by the program image.

use indexmap::IndexMap;

use ilaot_core::{FieldPlug, MethodId, Program, TypeId, naming};

use crate::Result;

/// Plug lookups for one run.
///
/// Method plugs are keyed by the label of the method they replace, so every
/// reference site resolves to the same replacement.
#[derive(Clone, Debug, Default)]
pub struct PlugTable {
    methods: IndexMap<String, MethodId>,
    fields: IndexMap<TypeId, Vec<FieldPlug>>,
}

impl PlugTable {
    pub fn build(program: &Program) -> Result<Self> {
        let mut table = Self::default();
        for plug in &program.plugs.methods {
            program.method(plug.replacement)?;
            let label = naming::method_label(&program.method_signature(plug.target)?);
            table.methods.insert(label, plug.replacement);
        }
        for plug in &program.plugs.fields {
            program.ty(plug.declaring)?;
            program.ty(plug.field_type)?;
            table
                .fields
                .entry(plug.declaring)
                .or_default()
                .push(plug.clone());
        }
        Ok(table)
    }

    pub fn replacement(&self, label: &str) -> Option<MethodId> {
        self.methods.get(label).copied()
    }

    /// Field plugs declared for `ty`, in image order.
    pub fn field_plugs(&self, ty: TypeId) -> &[FieldPlug] {
        self.fields.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}
