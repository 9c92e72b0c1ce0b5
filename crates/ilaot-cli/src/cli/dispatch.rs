//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! - `*Params` structs mirror the command `*Args` but are populated from clap
//! - `from_matches()` pulls the relevant fields, ignoring hidden ones
//! - `Into<*Args>` impls bridge dispatch to the command handlers

use std::path::PathBuf;

use clap::ArgMatches;

use ilaot_compiler::{OutputKind, Target};

use crate::commands::check::CheckArgs;
use crate::commands::compile::CompileArgs;
use crate::commands::symbols::SymbolsArgs;

pub struct CompileParams {
    pub image: PathBuf,
    pub out_dir: Option<PathBuf>,
    pub stem: Option<String>,
    pub binary: bool,
    pub origin: Option<u32>,
    pub debug: bool,
    pub target: Target,
    pub threads: usize,
    pub verbose: u8,
}

impl CompileParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image: image_path(m),
            out_dir: m.get_one::<PathBuf>("out_dir").cloned(),
            stem: m.get_one::<String>("stem").cloned(),
            binary: m.get_flag("binary"),
            origin: m.get_one::<u32>("origin").copied(),
            debug: m.get_flag("debug"),
            target: target(m),
            threads: threads(m),
            verbose: m.get_count("verbose"),
        }
    }
}

impl From<CompileParams> for CompileArgs {
    fn from(p: CompileParams) -> Self {
        Self {
            image: p.image,
            out_dir: p.out_dir,
            stem: p.stem,
            output: if p.binary {
                OutputKind::Binary
            } else {
                OutputKind::Assembly
            },
            origin: p.origin,
            debug: p.debug,
            target: p.target,
            threads: p.threads,
        }
    }
}

pub struct CheckParams {
    pub image: PathBuf,
    pub target: Target,
    pub threads: usize,
    pub verbose: u8,
    // Note: out_dir, stem, binary, origin, debug are parsed but not extracted
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            image: image_path(m),
            target: target(m),
            threads: threads(m),
            verbose: m.get_count("verbose"),
        }
    }
}

impl From<CheckParams> for CheckArgs {
    fn from(p: CheckParams) -> Self {
        Self {
            image: p.image,
            target: p.target,
            threads: p.threads,
        }
    }
}

pub struct SymbolsParams {
    pub path: PathBuf,
    pub method: Option<String>,
    pub verbose: u8,
}

impl SymbolsParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            path: m
                .get_one::<PathBuf>("symbols")
                .cloned()
                .expect("symbols is required"),
            method: m.get_one::<String>("method").cloned(),
            verbose: m.get_count("verbose"),
        }
    }
}

impl From<SymbolsParams> for SymbolsArgs {
    fn from(p: SymbolsParams) -> Self {
        Self {
            path: p.path,
            method: p.method,
        }
    }
}

fn image_path(m: &ArgMatches) -> PathBuf {
    m.get_one::<PathBuf>("image")
        .cloned()
        .expect("image is required")
}

fn target(m: &ArgMatches) -> Target {
    m.get_one::<Target>("target").copied().unwrap_or_default()
}

fn threads(m: &ArgMatches) -> usize {
    m.get_one::<usize>("threads").copied().unwrap_or(1)
}
