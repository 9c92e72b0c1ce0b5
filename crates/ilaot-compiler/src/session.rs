//! Shared state of one compilation run.
//!
//! The method, static field and type tables are each behind their own
//! `RwLock` so scan workers can queue concurrently. Inserts are
//! double-checked: a read-locked lookup first, then a re-check under the
//! write lock. Ordinals are insertion order and never change.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use ilaot_core::image::{ARRAY_TYPE, OBJECT_TYPE};
use ilaot_core::{FieldId, MethodId, Program, TypeId, TypeShape, naming};

use crate::layout::Layouts;
use crate::plugs::PlugTable;
use crate::{Error, Result};

/// Per-method scratch values written by scan hooks and read back during
/// code generation.
pub type MethodData = IndexMap<String, i64>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodState {
    Queued,
    PreProcessed,
    Processed,
}

#[derive(Clone, Debug)]
pub struct MethodEntry {
    pub state: MethodState,
    pub data: MethodData,
    /// Replacement implementation from the plug table.
    pub plug: Option<MethodId>,
}

impl MethodEntry {
    fn new() -> Self {
        Self {
            state: MethodState::Queued,
            data: MethodData::new(),
            plug: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticFieldEntry {
    pub label: String,
    pub processed: bool,
}

pub struct Session<'p> {
    program: &'p Program,
    debug: bool,
    methods: RwLock<IndexMap<MethodId, MethodEntry>>,
    fields: RwLock<IndexMap<FieldId, StaticFieldEntry>>,
    types: RwLock<IndexSet<TypeId>>,
    frozen: AtomicBool,
    plugs: OnceLock<PlugTable>,
}

impl<'p> Session<'p> {
    pub fn new(program: &'p Program, debug: bool) -> Self {
        Self {
            program,
            debug,
            methods: RwLock::new(IndexMap::new()),
            fields: RwLock::new(IndexMap::new()),
            types: RwLock::new(IndexSet::new()),
            frozen: AtomicBool::new(false),
            plugs: OnceLock::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn init_plugs(&self, table: PlugTable) -> Result<()> {
        self.plugs
            .set(table)
            .map_err(|_| Error::PlugsAlreadyInitialized)
    }

    pub fn plugs(&self) -> Option<&PlugTable> {
        self.plugs.get()
    }

    pub fn layouts(&self) -> Layouts<'_> {
        Layouts::new(self.program, self.plugs.get())
    }

    pub fn method_label(&self, id: MethodId) -> Result<String> {
        Ok(naming::method_label(&self.program.method_signature(id)?))
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    // Methods

    /// Queue a method. Returns `false` when it was already known.
    pub fn queue_method(&self, id: MethodId) -> Result<bool> {
        self.program.method(id)?;
        if self.methods.read().contains_key(&id) {
            return Ok(false);
        }
        if self.is_frozen() {
            return Err(Error::Frozen(self.program.method_signature(id)?));
        }
        let mut methods = self.methods.write();
        if methods.contains_key(&id) {
            return Ok(false);
        }
        methods.insert(id, MethodEntry::new());
        tracing::trace!(method = %id, ordinal = methods.len() - 1, "queued method");
        Ok(true)
    }

    pub fn is_method_queued(&self, id: MethodId) -> bool {
        self.methods.read().contains_key(&id)
    }

    pub fn method_ordinal(&self, id: MethodId) -> Option<usize> {
        self.methods.read().get_index_of(&id)
    }

    pub fn method_count(&self) -> usize {
        self.methods.read().len()
    }

    /// Every queued method, in ordinal order.
    pub fn method_ids(&self) -> Vec<MethodId> {
        self.methods.read().keys().copied().collect()
    }

    /// Methods still waiting for pre-processing, in ordinal order.
    pub fn pending_methods(&self) -> Vec<MethodId> {
        self.methods
            .read()
            .iter()
            .filter(|(_, entry)| entry.state == MethodState::Queued)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn method_state(&self, id: MethodId) -> Option<MethodState> {
        self.methods.read().get(&id).map(|entry| entry.state)
    }

    /// Move a queued method to `PreProcessed`. Only one caller wins.
    pub fn claim_method(&self, id: MethodId) -> bool {
        match self.methods.read().get(&id) {
            Some(entry) if entry.state == MethodState::Queued => {}
            _ => return false,
        }
        let mut methods = self.methods.write();
        match methods.get_mut(&id) {
            Some(entry) if entry.state == MethodState::Queued => {
                entry.state = MethodState::PreProcessed;
                true
            }
            _ => false,
        }
    }

    pub fn mark_processed(&self, id: MethodId) {
        if let Some(entry) = self.methods.write().get_mut(&id) {
            entry.state = MethodState::Processed;
        }
    }

    pub fn store_method_data(&self, id: MethodId, data: MethodData) {
        if let Some(entry) = self.methods.write().get_mut(&id) {
            entry.data = data;
        }
    }

    pub fn method_data(&self, id: MethodId) -> MethodData {
        self.methods
            .read()
            .get(&id)
            .map(|entry| entry.data.clone())
            .unwrap_or_default()
    }

    pub fn set_method_plug(&self, id: MethodId, replacement: MethodId) {
        if let Some(entry) = self.methods.write().get_mut(&id) {
            entry.plug = Some(replacement);
        }
    }

    pub fn method_plug(&self, id: MethodId) -> Option<MethodId> {
        self.methods.read().get(&id).and_then(|entry| entry.plug)
    }

    // Static fields

    pub fn queue_static_field(&self, id: FieldId) -> Result<bool> {
        let full_name = self.program.field_full_name(id)?;
        if self.fields.read().contains_key(&id) {
            return Ok(false);
        }
        if self.is_frozen() {
            return Err(Error::Frozen(full_name));
        }
        let mut fields = self.fields.write();
        if fields.contains_key(&id) {
            return Ok(false);
        }
        fields.insert(
            id,
            StaticFieldEntry {
                label: naming::static_field_label(&full_name),
                processed: false,
            },
        );
        Ok(true)
    }

    /// Queued static fields and their data member names, in ordinal order.
    pub fn static_fields(&self) -> Vec<(FieldId, String)> {
        self.fields
            .read()
            .iter()
            .map(|(&id, entry)| (id, entry.label.clone()))
            .collect()
    }

    pub fn static_field_count(&self) -> usize {
        self.fields.read().len()
    }

    pub fn mark_field_processed(&self, id: FieldId) {
        if let Some(entry) = self.fields.write().get_mut(&id) {
            entry.processed = true;
        }
    }

    // Types

    /// Arrays collapse to `System.Array`; pointers and by-refs to their element.
    pub fn canonical_type(&self, id: TypeId) -> Result<TypeId> {
        let mut current = id;
        loop {
            let td = self.program.ty(current)?;
            match td.shape {
                TypeShape::Named => return Ok(current),
                TypeShape::Array { rank, .. } if rank != 1 => {
                    return Err(Error::MultiDimensionalArray(td.full_name()));
                }
                TypeShape::Array { .. } => return Ok(self.program.require_type(ARRAY_TYPE)?),
                TypeShape::Pointer { element } | TypeShape::ByRef { element } => current = element,
            }
        }
    }

    /// Register a type and its base chain. Returns the type's ordinal.
    pub fn register_type(&self, id: TypeId) -> Result<usize> {
        let canonical = self.canonical_type(id)?;
        if let Some(ordinal) = self.types.read().get_index_of(&canonical) {
            return Ok(ordinal);
        }
        let td = self.program.ty(canonical)?;
        if self.is_frozen() {
            return Err(Error::Frozen(td.full_name()));
        }
        let (ordinal, inserted) = self.types.write().insert_full(canonical);
        if inserted {
            tracing::trace!(ty = %td.full_name(), ordinal, "registered type");
            if td.full_name() != OBJECT_TYPE
                && let Some(base) = td.base
            {
                self.register_type(base)?;
            }
        }
        Ok(ordinal)
    }

    pub fn is_type_registered(&self, id: TypeId) -> bool {
        match self.canonical_type(id) {
            Ok(canonical) => self.types.read().contains(&canonical),
            Err(_) => false,
        }
    }

    /// Registered types, in ordinal order.
    pub fn registered_types(&self) -> Vec<TypeId> {
        self.types.read().iter().copied().collect()
    }

    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }
}
