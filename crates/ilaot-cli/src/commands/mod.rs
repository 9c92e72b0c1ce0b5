pub mod check;
pub mod compile;
pub mod symbols;


use std::path::{Path, PathBuf};

use ilaot_asm::SymbolError;
use ilaot_core::{ImageError, Program};

/// Failure of a command, printed as `error: ...` before exiting with status 1.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{path}: {source}")]
    Image { path: PathBuf, source: ImageError },

    #[error(transparent)]
    Compile(#[from] ilaot_compiler::Error),

    #[error("{path}: {source}")]
    Symbols { path: PathBuf, source: SymbolError },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn load_program(path: &Path) -> Result<Program, CommandError> {
    Program::from_path(path).map_err(|source| CommandError::Image {
        path: path.to_owned(),
        source,
    })
}

/// Unwrap a command result or report the error and exit.
pub fn or_exit<T>(result: Result<T, CommandError>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(1);
    })
}
