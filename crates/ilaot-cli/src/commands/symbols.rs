use std::fmt::Write as _;
use std::path::PathBuf;

use ilaot_asm::SymbolFile;

use super::{CommandError, or_exit};

pub struct SymbolsArgs {
    pub path: PathBuf,
    pub method: Option<String>,
}

pub fn run(args: SymbolsArgs) {
    let file = or_exit(SymbolFile::from_path(&args.path).map_err(|source| {
        CommandError::Symbols {
            path: args.path.clone(),
            source,
        }
    }));
    print!("{}", render(&file, args.method.as_deref()));
}

/// One line per record, grouped under its method label.
pub fn render(file: &SymbolFile, method: Option<&str>) -> String {
    let header = file.header();
    let mut out = String::new();
    writeln!(
        out,
        "ILDS v{}, {} records",
        header.version, header.record_count
    )
    .unwrap();

    let mut current: Option<&str> = None;
    for entry in file.iter() {
        if method.is_some_and(|m| m != entry.method_label) {
            continue;
        }
        if current != Some(entry.method_label) {
            writeln!(
                out,
                "{} (token {:#010x}, type {:#010x})",
                entry.method_label, entry.method_token, entry.type_token
            )
            .unwrap();
            current = Some(entry.method_label);
        }
        writeln!(
            out,
            "  IL_{:04X} depth {:<3} {}",
            entry.il_offset, entry.stack_depth, entry.instruction_label
        )
        .unwrap();
    }
    out
}
