//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` so the same definition can be reused
//! across commands, visible on some and hidden (via `.hide(true)`) on others.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

use ilaot_compiler::Target;

/// Program image, JSON or `.ilimg` (positional).
pub fn image_path_arg() -> Arg {
    Arg::new("image")
        .value_name("IMAGE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Program image (.json, or .ilimg for the binary form)")
}

/// Output directory (-o/--out-dir).
pub fn out_dir_arg() -> Arg {
    Arg::new("out_dir")
        .short('o')
        .long("out-dir")
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .help("Directory for output files (default: next to the image)")
}

/// Output file stem (--stem).
pub fn stem_arg() -> Arg {
    Arg::new("stem")
        .long("stem")
        .value_name("NAME")
        .help("Base name of output files (default: image file stem)")
}

/// Flat binary instead of NASM text (--binary).
pub fn binary_arg() -> Arg {
    Arg::new("binary")
        .long("binary")
        .action(ArgAction::SetTrue)
        .help("Emit a flat binary image instead of NASM text")
}

/// Load address of the binary image (--origin).
pub fn origin_arg() -> Arg {
    Arg::new("origin")
        .long("origin")
        .value_name("ADDR")
        .value_parser(parse_address)
        .help("Load address of the binary image, decimal or 0x-prefixed hex")
}

/// Platform to generate code for (--target).
pub fn target_arg() -> Arg {
    Arg::new("target")
        .long("target")
        .value_name("PLATFORM")
        .default_value("x86")
        .value_parser(parse_target)
        .help("Platform to generate code for")
}

/// Debug mode (-g/--debug).
pub fn debug_arg() -> Arg {
    Arg::new("debug")
        .short('g')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Insert debug stub calls and write a symbol file")
}

/// Scan workers (-j/--threads).
pub fn threads_arg() -> Arg {
    Arg::new("threads")
        .short('j')
        .long("threads")
        .value_name("N")
        .default_value("1")
        .value_parser(value_parser!(usize))
        .help("Worker threads for the reachability scan")
}

/// Verbosity level (-v, -vv).
pub fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Verbosity level (-v for debug, -vv for trace)")
}

/// Debug symbol file (positional).
pub fn symbols_path_arg() -> Arg {
    Arg::new("symbols")
        .value_name("FILE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Debug symbol file (.ilds)")
}

/// Restrict output to one method (--method).
pub fn method_arg() -> Arg {
    Arg::new("method")
        .long("method")
        .value_name("LABEL")
        .help("Only show records of the method with this label")
}

pub fn parse_target(text: &str) -> Result<Target, String> {
    text.parse::<Target>().map_err(|e| e.to_string())
}

pub fn parse_address(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address `{text}`: {e}"))
}
