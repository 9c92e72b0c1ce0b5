use std::path::PathBuf;

use ilaot_compiler::{CompileStats, Engine, Target};

use super::{CommandError, load_program, or_exit};

pub struct CheckArgs {
    pub image: PathBuf,
    pub target: Target,
    pub threads: usize,
}

pub fn run(args: CheckArgs) {
    let stats = or_exit(check(&args));
    println!(
        "{} methods, {} types, {} static fields",
        stats.methods, stats.types, stats.static_fields
    );
}

pub fn check(args: &CheckArgs) -> Result<CompileStats, CommandError> {
    let program = load_program(&args.image)?;
    let stats = Engine::builder(&program)
        .threads(args.threads)
        .target(args.target)
        .build()?
        .check()?;
    Ok(stats)
}
