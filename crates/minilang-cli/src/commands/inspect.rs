//! Commands that print one intermediate form of a program.

use std::path::Path;

use minilang_dsl::printer::{ast_to_string, format_program};
use minilang_engine::pipeline::{analyze_source, AnalyzedProgram};
use minilang_smt::encoder::encode;

use crate::commands::helpers::{pipeline_report, print_json, read_source};
use crate::types::{OutputFormat, RunCfg};

fn analyzed(file: &Path, cfg: &RunCfg) -> miette::Result<AnalyzedProgram> {
    let (source, filename) = read_source(file)?;
    analyze_source(&source, &filename, &cfg.options).map_err(pipeline_report)
}

pub(crate) fn run_parse_tree_command(file: &Path) -> miette::Result<()> {
    let (source, filename) = read_source(file)?;
    let tree = minilang_dsl::parse_tree(&source, &filename)?;
    println!("{tree}");
    Ok(())
}

pub(crate) fn run_ast_command(file: &Path, cfg: &RunCfg) -> miette::Result<()> {
    let (source, filename) = read_source(file)?;
    let program = minilang_dsl::parse(&source, &filename)?;
    match cfg.format {
        OutputFormat::Json => print_json(&program),
        OutputFormat::Text => {
            println!("{}", ast_to_string(&program));
            Ok(())
        }
    }
}

pub(crate) fn run_unroll_command(file: &Path, cfg: &RunCfg) -> miette::Result<()> {
    let analyzed = analyzed(file, cfg)?;
    match cfg.format {
        OutputFormat::Json => print_json(&analyzed.unrolled),
        OutputFormat::Text => {
            print!("{}", format_program(&analyzed.unrolled));
            Ok(())
        }
    }
}

pub(crate) fn run_ssa_command(file: &Path, cfg: &RunCfg) -> miette::Result<()> {
    let analyzed = analyzed(file, cfg)?;
    match cfg.format {
        OutputFormat::Json => print_json(&analyzed.ssa),
        OutputFormat::Text => {
            println!("{}", analyzed.ssa);
            Ok(())
        }
    }
}

pub(crate) fn run_smt_command(file: &Path, cfg: &RunCfg) -> miette::Result<()> {
    let analyzed = analyzed(file, cfg)?;
    let encoding = encode(&analyzed.ssa).map_err(|e| miette::miette!("Encoding error: {e}"))?;
    print!("{}", encoding.to_smtlib_script());
    Ok(())
}
