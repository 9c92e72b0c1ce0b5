mod cli;
mod commands;

use cli::{CheckParams, CompileParams, SymbolsParams, build_cli, init_logging};

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("compile", m)) => {
            let params = CompileParams::from_matches(m);
            init_logging(params.verbose);
            commands::compile::run(params.into());
        }
        Some(("check", m)) => {
            let params = CheckParams::from_matches(m);
            init_logging(params.verbose);
            commands::check::run(params.into());
        }
        Some(("symbols", m)) => {
            let params = SymbolsParams::from_matches(m);
            init_logging(params.verbose);
            commands::symbols::run(params.into());
        }
        _ => unreachable!("clap should have caught this"),
    }
}
