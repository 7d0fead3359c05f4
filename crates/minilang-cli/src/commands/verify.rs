use std::path::{Path, PathBuf};

use tracing::info;

use minilang_engine::pipeline::{analyze_source, check_assertions, check_equivalence, PipelineOptions};

use crate::commands::helpers::{pipeline_report, print_json, read_source};
use crate::types::{OutputFormat, RunCfg};

/// Run the `verify` CLI command.
pub(crate) fn run_verify_command(
    file: &Path,
    dump_smt: Option<PathBuf>,
    cfg: &RunCfg,
) -> miette::Result<()> {
    let (source, filename) = read_source(file)?;
    let options = PipelineOptions {
        dump_smt,
        ..cfg.options.clone()
    };
    let analyzed = analyze_source(&source, &filename, &options).map_err(pipeline_report)?;
    let result = check_assertions(&analyzed.ssa, &options).map_err(pipeline_report)?;
    match cfg.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => println!("{result}"),
    }
    Ok(())
}

/// Run the `equiv` CLI command.
///
/// Front-end failures abort; solver trouble is part of the verdict.
pub(crate) fn run_equiv_command(file1: &Path, file2: &Path, cfg: &RunCfg) -> miette::Result<()> {
    if file1.as_os_str() == "-" && file2.as_os_str() == "-" {
        miette::bail!("Only one of the two programs can be read from stdin.");
    }
    let (source1, filename1) = read_source(file1)?;
    let (source2, filename2) = read_source(file2)?;
    let first = analyze_source(&source1, &filename1, &cfg.options).map_err(pipeline_report)?;
    let second = analyze_source(&source2, &filename2, &cfg.options).map_err(pipeline_report)?;
    info!(
        program1 = %filename1,
        program2 = %filename2,
        "checking equivalence"
    );
    let result = check_equivalence(&first.ssa, &second.ssa, &cfg.options);
    match cfg.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => println!("{result}"),
    }
    Ok(())
}
