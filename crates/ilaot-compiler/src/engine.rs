//! Compilation facade: reachability, code generation and output encoding.

use ilaot_asm::text::{self, TextOutput};
use ilaot_asm::{Assembly, DebugSymbol, FlatImage, SymbolWriter};
use ilaot_core::Program;

use crate::codegen::CodeGen;
use crate::config::{CompileOptions, OutputKind, Target};
use crate::plugs::PlugTable;
use crate::scanner::Scanner;
use crate::session::Session;
use crate::Result;

/// `(current, total)` observer called while a phase walks its items.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

pub struct EngineBuilder<'p> {
    program: &'p Program,
    options: CompileOptions,
    on_compiling_methods: Option<ProgressFn>,
    on_compiling_static_fields: Option<ProgressFn>,
}

impl<'p> EngineBuilder<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            options: CompileOptions::default(),
            on_compiling_methods: None,
            on_compiling_static_fields: None,
        }
    }

    /// Replace every option at once.
    pub fn options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.options.threads = threads;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    pub fn output(mut self, output: OutputKind) -> Self {
        self.options.output = output;
        self
    }

    pub fn origin(mut self, origin: u32) -> Self {
        self.options.origin = origin;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.options.target = target;
        self
    }

    pub fn on_compiling_methods(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_compiling_methods = Some(Box::new(f));
        self
    }

    pub fn on_compiling_static_fields(
        mut self,
        f: impl Fn(usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.on_compiling_static_fields = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Engine<'p>> {
        self.options.validate()?;
        Ok(Engine {
            program: self.program,
            options: self.options,
            on_compiling_methods: self.on_compiling_methods,
            on_compiling_static_fields: self.on_compiling_static_fields,
        })
    }
}

/// Counts of what a run compiled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub methods: usize,
    pub types: usize,
    pub static_fields: usize,
}

impl CompileStats {
    fn of(session: &Session<'_>) -> Self {
        Self {
            methods: session.method_count(),
            types: session.type_count(),
            static_fields: session.static_field_count(),
        }
    }
}

#[derive(Debug)]
pub struct CompileOutput {
    pub assembly: Assembly,
    /// Present when the run was configured for [`OutputKind::Binary`].
    pub image: Option<FlatImage>,
    /// Empty unless debug mode is on.
    pub symbols: Vec<DebugSymbol>,
    pub stats: CompileStats,
}

impl CompileOutput {
    pub fn text(&self, stem: &str) -> TextOutput {
        text::render(&self.assembly, stem)
    }

    /// Serialized debug symbol file, when any symbols were collected.
    pub fn symbol_file(&self) -> Option<Vec<u8>> {
        if self.symbols.is_empty() {
            return None;
        }
        let mut writer = SymbolWriter::new();
        writer.extend(&self.symbols);
        Some(writer.to_bytes())
    }
}

/// One configured compiler over one program image.
pub struct Engine<'p> {
    program: &'p Program,
    options: CompileOptions,
    on_compiling_methods: Option<ProgressFn>,
    on_compiling_static_fields: Option<ProgressFn>,
}

impl<'p> Engine<'p> {
    pub fn builder(program: &'p Program) -> EngineBuilder<'p> {
        EngineBuilder::new(program)
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn session(&self) -> Result<Session<'p>> {
        let session = Session::new(self.program, self.options.debug);
        session.init_plugs(PlugTable::build(self.program)?)?;
        Ok(session)
    }

    /// Run reachability only and report what would be compiled.
    pub fn check(&self) -> Result<CompileStats> {
        let session = self.session()?;
        let map = self.options.target.opcode_map();
        Scanner::new(&session, &map)
            .threads(self.options.threads)
            .run()?;
        Ok(CompileStats::of(&session))
    }

    pub fn compile(&self) -> Result<CompileOutput> {
        let session = self.session()?;
        let map = self.options.target.opcode_map();
        tracing::debug!(platform = %self.options.target, "generating code");
        let entry = Scanner::new(&session, &map)
            .threads(self.options.threads)
            .run()?;

        let silent = |_: usize, _: usize| {};
        let on_methods = self.on_compiling_methods.as_deref().unwrap_or(&silent);
        let on_fields = self
            .on_compiling_static_fields
            .as_deref()
            .unwrap_or(&silent);
        let (asm, symbols) = CodeGen::new(&session, &map).emit_program(entry, on_methods, on_fields)?;
        let assembly = asm.finish();

        let image = match self.options.output {
            OutputKind::Assembly => None,
            OutputKind::Binary => Some(ilaot_asm::encode(&assembly, self.options.origin)?),
        };
        let stats = CompileStats::of(&session);
        tracing::info!(
            methods = stats.methods,
            types = stats.types,
            static_fields = stats.static_fields,
            instructions = assembly.instruction_count(),
            "compiled"
        );
        Ok(CompileOutput {
            assembly,
            image,
            symbols,
            stats,
        })
    }
}
