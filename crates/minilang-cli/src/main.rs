//! `minilang`: parse, unroll, SSA-convert, verify and compare minilang programs.

mod cli;
mod commands;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::helpers::run_cfg_from_cli;

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = run_cfg_from_cli(&cli)?;

    match cli.command {
        Commands::ParseTree { file } => commands::inspect::run_parse_tree_command(&file),
        Commands::Ast { file } => commands::inspect::run_ast_command(&file, &cfg),
        Commands::Unroll { file } => commands::inspect::run_unroll_command(&file, &cfg),
        Commands::Ssa { file } => commands::inspect::run_ssa_command(&file, &cfg),
        Commands::Smt { file } => commands::inspect::run_smt_command(&file, &cfg),
        Commands::Verify { file, dump_smt } => {
            commands::verify::run_verify_command(&file, dump_smt, &cfg)
        }
        Commands::Equiv { file1, file2 } => {
            commands::verify::run_equiv_command(&file1, &file2, &cfg)
        }
        Commands::Demo => commands::demo::run_demo_command(&cfg),
    }
}
