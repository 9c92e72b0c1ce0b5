//! `ilaot compile`: run the engine and write its artifacts.
//!
//! Nothing is written unless compilation succeeds. Output files share one
//! stem: `{stem}.asm` and `{stem}.data.asm` for text, `{stem}.bin` for a flat
//! image, plus `{stem}.ilds` in debug mode.

use std::fs;
use std::path::{Path, PathBuf};

use ilaot_compiler::{CompileOutput, Engine, OutputKind, Target};

use super::{CommandError, load_program, or_exit};

pub struct CompileArgs {
    pub image: PathBuf,
    pub out_dir: Option<PathBuf>,
    pub stem: Option<String>,
    pub output: OutputKind,
    pub origin: Option<u32>,
    pub debug: bool,
    pub target: Target,
    pub threads: usize,
}

impl CompileArgs {
    pub fn stem(&self) -> String {
        if let Some(stem) = &self.stem {
            return stem.clone();
        }
        self.image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_owned())
    }

    pub fn out_dir(&self) -> PathBuf {
        if let Some(dir) = &self.out_dir {
            return dir.clone();
        }
        match self.image.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        }
    }
}

pub fn run(args: CompileArgs) {
    for path in or_exit(compile(&args)) {
        tracing::debug!(path = %path.display(), "wrote");
    }
}

/// Compile and write every artifact. Returns the written paths.
pub fn compile(args: &CompileArgs) -> Result<Vec<PathBuf>, CommandError> {
    let program = load_program(&args.image)?;

    let mut builder = Engine::builder(&program)
        .threads(args.threads)
        .debug(args.debug)
        .target(args.target)
        .output(args.output);
    if let Some(origin) = args.origin {
        builder = builder.origin(origin);
    }
    let out = builder.build()?.compile()?;

    write_outputs(&out, &args.out_dir(), &args.stem())
}

pub fn write_outputs(out: &CompileOutput, dir: &Path, stem: &str) -> Result<Vec<PathBuf>, CommandError> {
    fs::create_dir_all(dir).map_err(|source| CommandError::Write {
        path: dir.to_owned(),
        source,
    })?;

    let mut files: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    match &out.image {
        Some(image) => files.push((dir.join(format!("{stem}.bin")), image.bytes.clone())),
        None => {
            let text = out.text(stem);
            files.push((dir.join(&text.code_file), text.code.into_bytes()));
            files.push((dir.join(&text.data_file), text.data.into_bytes()));
        }
    }
    if let Some(symbols) = out.symbol_file() {
        files.push((dir.join(format!("{stem}.ilds")), symbols));
    }

    let mut written = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        fs::write(&path, bytes).map_err(|source| CommandError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}
