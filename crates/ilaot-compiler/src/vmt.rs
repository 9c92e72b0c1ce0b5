//! Virtual method tables.
//!
//! A method's identifier at run time is its ordinal in the frozen method
//! table. Overrides are registered under the identifier of their ultimate
//! base method, which is what `callvirt` sites look up.

use indexmap::{IndexMap, IndexSet};

use ilaot_asm::{Assembler, Operand};
use ilaot_core::image::OBJECT_TYPE;
use ilaot_core::{MethodId, Program, TypeId, Visibility};

use crate::Result;
use crate::session::Session;

/// The least-derived declaration a method overrides or hides.
pub fn ultimate_base(program: &Program, method: MethodId) -> Result<MethodId> {
    let declaring = program.method(method)?.declaring;
    let ancestors = program.ancestors(declaring)?;
    ultimate_base_in(program, method, &ancestors)
}

/// [`ultimate_base`] over an explicit ancestor chain, nearest first.
///
/// Candidates are the consecutive ancestors declaring a method with the same
/// name and parameter types. They are ranked by matching modifiers, then by
/// living in the same assembly as `method`, then by distance.
pub fn ultimate_base_in(
    program: &Program,
    method: MethodId,
    ancestors: &[TypeId],
) -> Result<MethodId> {
    let m = program.method(method)?;
    let params: Vec<TypeId> = m.param_types().collect();
    let assembly = &program.ty(m.declaring)?.assembly;

    let mut best: Option<((bool, bool, usize), MethodId)> = None;
    for (distance, &ancestor) in ancestors.iter().enumerate() {
        let Some(found) = program.find_method(ancestor, &m.name, &params)? else {
            break;
        };
        let f = program.method(found)?;
        let agrees = f.is_virtual == m.is_virtual
            && f.visibility != Visibility::Private
            && f.visibility == m.visibility
            && !f.is_final;
        let same_assembly = program.ty(f.declaring)?.assembly == *assembly;
        let rank = (agrees, same_assembly, distance);
        if best.as_ref().is_none_or(|(r, _)| rank > *r) {
            best = Some((rank, found));
        }
    }
    Ok(best.map_or(method, |(_, id)| id))
}

/// Implementation of interface method `method` on `ty`: an explicit
/// `Interface.Name` method, then a same-named method, then the interface map.
pub fn resolve_interface_impl(
    program: &Program,
    ty: TypeId,
    interface: TypeId,
    method: MethodId,
) -> Result<Option<MethodId>> {
    let m = program.method(method)?;
    let params: Vec<TypeId> = m.param_types().collect();
    let explicit = format!("{}.{}", program.type_name(interface)?, m.name);
    let chain = program.base_chain(ty)?;

    for name in [explicit.as_str(), m.name.as_str()] {
        for &t in &chain {
            if let Some(found) = program.find_method(t, name, &params)?
                && program.method(found)?.is_instance()
            {
                return Ok(Some(found));
            }
        }
    }
    for &t in &chain {
        for entry in &program.ty(t)?.interface_map {
            if entry.interface_method == method {
                return Ok(Some(entry.implementation));
            }
        }
    }
    Ok(None)
}

/// Queue the overrides and interface implementations that virtual dispatch
/// can reach. Returns how many methods were newly queued.
pub fn discovery_sweep(session: &Session<'_>) -> Result<usize> {
    let program = session.program();
    let mut added = 0;

    for id in session.method_ids() {
        if program.method(id)?.is_instance() && session.queue_method(ultimate_base(program, id)?)? {
            added += 1;
        }
    }

    let mut types: IndexSet<TypeId> = IndexSet::new();
    for id in session.method_ids() {
        let m = program.method(id)?;
        if m.is_instance() {
            types.insert(m.declaring);
        }
    }
    types.extend(session.registered_types());
    for t in types.clone() {
        types.extend(program.ancestors(t)?);
    }

    for &t in &types {
        let td = program.ty(t)?;
        if td.base.is_none() {
            continue;
        }
        for &id in &td.methods {
            let m = program.method(id)?;
            if !m.is_instance() || !m.is_virtual || m.is_ctor() {
                continue;
            }
            let base = ultimate_base(program, id)?;
            if base != id && session.is_method_queued(base) && session.queue_method(id)? {
                added += 1;
            }
        }
    }

    let mut interfaces: IndexMap<TypeId, Vec<TypeId>> = IndexMap::new();
    for t in session.registered_types() {
        if !program.ty(t)?.is_interface() {
            interfaces.insert(t, program.implemented_interfaces(t)?);
        }
    }
    for id in session.method_ids() {
        let declaring = program.method(id)?.declaring;
        if !program.ty(declaring)?.is_interface() {
            continue;
        }
        for (&t, implemented) in &interfaces {
            if !implemented.contains(&declaring) {
                continue;
            }
            if let Some(imp) = resolve_interface_impl(program, t, declaring, id)?
                && session.queue_method(imp)?
            {
                added += 1;
            }
        }
    }

    tracing::debug!(added, "vmt discovery sweep");
    Ok(added)
}

/// Body of `____INIT__VMT____`: announce the type table, then every type and
/// its callable instance methods.
pub fn emit_init_vmt(asm: &mut Assembler, session: &Session<'_>) -> Result<()> {
    let program = session.program();
    let hooks = &program.runtime;
    let types = session.registered_types();
    let methods = session.method_ids();

    let load_type_table = session.method_label(hooks.load_type_table)?;
    let set_type_info = session.method_label(hooks.set_type_info)?;
    let set_method_info = session.method_label(hooks.set_method_info)?;

    asm.push(types.len() as i32);
    asm.call(load_type_table);

    for (i, &ty) in types.iter().enumerate() {
        let td = program.ty(ty)?;
        let base = match td.base {
            Some(base) if td.full_name() != OBJECT_TYPE => session.register_type(base)?,
            _ => i,
        };

        // abstract methods have no address to register
        let mut own = Vec::new();
        for &id in &methods {
            let m = program.method(id)?;
            if m.declaring == ty && m.is_instance() && !m.is_abstract {
                own.push(id);
            }
        }

        asm.comment(td.full_name());
        asm.push(i as i32);
        asm.push(base as i32);
        asm.push(own.len() as i32);
        asm.call(set_type_info.as_str());

        for (j, &id) in own.iter().enumerate() {
            let base_id = ultimate_base(program, id)?;
            let ordinal = crate::invariants::ensure_queued(session.method_ordinal(base_id), base_id);
            asm.push(i as i32);
            asm.push(j as i32);
            asm.push(ordinal as i32);
            asm.push(Operand::addr(session.method_label(id)?));
            asm.call(set_method_info.as_str());
        }
    }
    Ok(())
}
