//! Compilation options.

use std::fmt;
use std::str::FromStr;

use ilaot_asm::DEFAULT_ORIGIN;

use crate::ops::OpCodeMap;
use crate::{Error, Result};

/// Platform code is generated for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Target {
    /// 32-bit x86, protected mode, flat memory.
    #[default]
    X86,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::X86 => "x86",
        }
    }

    /// Generator table for this platform.
    pub fn opcode_map(self) -> OpCodeMap {
        match self {
            Target::X86 => OpCodeMap::x86(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" => Ok(Target::X86),
            _ => Err(Error::InvalidOptions(format!(
                "unsupported target platform `{name}`"
            ))),
        }
    }
}

/// Artifact produced by a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// NASM text (code file plus included data file).
    #[default]
    Assembly,
    /// Flat binary image loaded at [`CompileOptions::origin`].
    Binary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Scan workers. Code generation is always single threaded.
    pub threads: usize,
    /// Emit debug stub calls and collect debug symbols.
    pub debug: bool,
    pub output: OutputKind,
    pub origin: u32,
    pub target: Target,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            debug: false,
            output: OutputKind::Assembly,
            origin: DEFAULT_ORIGIN,
            target: Target::X86,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    pub fn origin(mut self, origin: u32) -> Self {
        self.origin = origin;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidOptions(
                "at least one scan thread is required".to_owned(),
            ));
        }
        if self.origin % 4 != 0 {
            return Err(Error::InvalidOptions(format!(
                "origin {:#x} is not 4-byte aligned",
                self.origin
            )));
        }
        Ok(())
    }
}
