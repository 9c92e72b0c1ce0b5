//! Reachability closure.
//!
//! Starting from the runtime hooks and the entry point, every queued method
//! is pre-processed once: its frame is resolved and each instruction's scan
//! hook queues whatever the instruction references. Rounds repeat, with a
//! VMT discovery sweep after each, until a round adds no method. The tables
//! are then frozen.

use std::thread;

use ilaot_core::MethodId;
use ilaot_core::image::OBJECT_TYPE;

use crate::Result;
use crate::method_info;
use crate::ops::OpCodeMap;
use crate::session::{MethodData, Session};
use crate::vmt;

pub struct Scanner<'s, 'p> {
    session: &'s Session<'p>,
    map: &'s OpCodeMap,
    threads: usize,
}

impl<'s, 'p> Scanner<'s, 'p> {
    pub fn new(session: &'s Session<'p>, map: &'s OpCodeMap) -> Self {
        Self {
            session,
            map,
            threads: 1,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Register `System.Object`, queue the bootstrap hooks, then the entry
    /// point. Returns the entry point.
    pub fn seed(&self) -> Result<MethodId> {
        let program = self.session.program();
        self.session
            .register_type(program.require_type(OBJECT_TYPE)?)?;
        for hook in program.runtime.bootstrap() {
            self.session.queue_method(hook)?;
        }
        let entry = program.entry_point()?;
        self.session.queue_method(entry)?;
        Ok(entry)
    }

    /// Seed, close over everything reachable and freeze the tables.
    pub fn run(&self) -> Result<MethodId> {
        let entry = self.seed()?;

        self.scan_methods()?;
        self.scan_static_fields();
        let mut round = 0;
        loop {
            round += 1;
            let before = self.session.method_count();
            self.scan_methods()?;
            self.scan_static_fields();
            vmt::discovery_sweep(self.session)?;
            let after = self.session.method_count();
            tracing::debug!(round, methods = after, types = self.session.type_count(), "scan round");
            if after == before {
                break;
            }
        }

        self.session.freeze();
        tracing::info!(
            methods = self.session.method_count(),
            types = self.session.type_count(),
            static_fields = self.session.static_field_count(),
            "reachability closed"
        );
        Ok(entry)
    }

    /// Pre-process pending methods until none are left, queuing the static
    /// constructors of newly registered types between passes.
    fn scan_methods(&self) -> Result<()> {
        loop {
            let pending = self.session.pending_methods();
            if pending.is_empty() {
                return Ok(());
            }
            self.scan_pass(&pending)?;
            self.queue_static_constructors()?;
        }
    }

    /// Static fields need no pre-processing; their storage is emitted as
    /// zeroed data.
    fn scan_static_fields(&self) {
        for (id, _) in self.session.static_fields() {
            self.session.mark_field_processed(id);
        }
    }

    fn scan_pass(&self, batch: &[MethodId]) -> Result<()> {
        let workers = self.threads.min(batch.len());
        if workers <= 1 {
            return batch.iter().try_for_each(|&id| self.preprocess(id));
        }

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    scope.spawn(move || {
                        batch
                            .iter()
                            .skip(worker)
                            .step_by(workers)
                            .try_for_each(|&id| self.preprocess(id))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect::<Result<Vec<()>>>()
        })?;
        Ok(())
    }

    fn queue_static_constructors(&self) -> Result<()> {
        let program = self.session.program();
        for ty in self.session.registered_types() {
            for &id in &program.ty(ty)?.methods {
                if program.method(id)?.is_cctor() {
                    self.session.queue_method(id)?;
                }
            }
        }
        Ok(())
    }

    /// Claim `id` and run the scan hooks of its body, leaving it
    /// `PreProcessed` until code generation. A method claimed by another
    /// worker is skipped.
    pub fn preprocess(&self, id: MethodId) -> Result<()> {
        if !self.session.claim_method(id) {
            return Ok(());
        }
        let program = self.session.program();
        let method = program.method(id)?;
        if method.is_abstract {
            return Ok(());
        }

        let label = self.session.method_label(id)?;
        tracing::debug!(method = %label, "scanning");
        self.session.register_type(method.declaring)?;
        let type_info = if method.is_instance() {
            Some(self.session.layouts().resolve_fields(method.declaring)?)
        } else {
            None
        };
        let mut data = MethodData::new();
        let info = method_info::resolve_method(
            self.session,
            id,
            id,
            &label,
            type_info,
            self.session.debug(),
            &data,
        )?;

        if let Some(replacement) = self.session.plugs().and_then(|p| p.replacement(&label)) {
            tracing::debug!(method = %label, replacement = %replacement, "plugged");
            self.session.queue_method(replacement)?;
            self.session.set_method_plug(id, replacement);
            return Ok(());
        }
        let signature = program.method_signature(id)?;
        if self.map.custom_implementation(&signature).is_some() || method.custom_assembler.is_some()
        {
            return Ok(());
        }

        if let Some(body) = &method.body {
            for instr in &body.instructions {
                tracing::trace!(method = %label, offset = instr.offset, op = %instr.op, "scan");
                self.map.scan(self.session, instr, &info, &mut data)?;
            }
            for handler in &body.handlers {
                if let Some(ty) = handler.catch_type {
                    self.session.register_type(ty)?;
                }
            }
        }
        self.session.store_method_data(id, data);
        Ok(())
    }
}
