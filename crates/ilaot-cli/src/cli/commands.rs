//! Command builders for the CLI.
//!
//! `check` accepts every `compile` flag so a compile invocation can be
//! turned into a dry run by changing the subcommand; the output flags are
//! hidden from its `--help`.

use clap::Command;

use super::args::*;

/// Add hidden output args (for commands that write nothing).
fn with_hidden_output_args(cmd: Command) -> Command {
    cmd.arg(out_dir_arg().hide(true))
        .arg(stem_arg().hide(true))
        .arg(binary_arg().hide(true))
        .arg(origin_arg().hide(true))
        .arg(debug_arg().hide(true))
}

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("ilaot")
        .about("Whole-program compiler from IL program images to 32-bit x86")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(compile_command())
        .subcommand(check_command())
        .subcommand(symbols_command())
}

/// Compile a program image.
pub fn compile_command() -> Command {
    Command::new("compile")
        .about("Compile a program image to NASM text or a flat binary")
        .after_help(
            r#"EXAMPLES:
  ilaot compile kernel.json                    # kernel.asm + kernel.data.asm
  ilaot compile kernel.json --binary           # kernel.bin at 0x100000
  ilaot compile kernel.ilimg --binary --origin 0x8000
  ilaot compile kernel.json -g -o build/       # also build/kernel.ilds"#,
        )
        .arg(image_path_arg())
        .arg(out_dir_arg())
        .arg(stem_arg())
        .arg(binary_arg())
        .arg(origin_arg())
        .arg(debug_arg())
        .arg(target_arg())
        .arg(threads_arg())
        .arg(verbose_arg())
}

/// Run reachability only.
pub fn check_command() -> Command {
    let cmd = Command::new("check")
        .about("Scan a program image and report what would be compiled")
        .after_help(
            r#"EXAMPLES:
  ilaot check kernel.json          # methods, types and static fields
  ilaot check kernel.json -j 8     # scan with 8 workers"#,
        )
        .arg(image_path_arg())
        .arg(target_arg())
        .arg(threads_arg())
        .arg(verbose_arg());

    with_hidden_output_args(cmd)
}

/// Dump a debug symbol file.
pub fn symbols_command() -> Command {
    Command::new("symbols")
        .about("List the records of a debug symbol file")
        .arg(symbols_path_arg())
        .arg(method_arg())
        .arg(verbose_arg())
}
