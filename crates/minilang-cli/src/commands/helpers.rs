use std::io::Read;
use std::path::Path;

use miette::IntoDiagnostic;
use serde::Serialize;

use minilang_engine::pipeline::{PipelineError, PipelineOptions, SolverChoice};
use minilang_ir::MergePolicy;

use crate::cli::Cli;
use crate::types::{OutputFormat, RunCfg};

pub(crate) fn parse_solver_choice(raw: &str) -> miette::Result<SolverChoice> {
    match raw {
        "z3" => Ok(SolverChoice::Z3),
        "cvc5" => Ok(SolverChoice::Cvc5),
        "bounded" => Ok(SolverChoice::Bounded),
        other => miette::bail!("Unknown solver: {other}. Use 'z3', 'cvc5', or 'bounded'."),
    }
}

pub(crate) fn parse_merge_policy(raw: &str) -> miette::Result<MergePolicy> {
    raw.parse::<MergePolicy>().map_err(|err| miette::miette!("{err}"))
}

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => miette::bail!("Unknown output format: {other}. Use 'text' or 'json'."),
    }
}

pub(crate) fn run_cfg_from_cli(cli: &Cli) -> miette::Result<RunCfg> {
    Ok(RunCfg {
        options: PipelineOptions {
            solver: parse_solver_choice(&cli.solver)?,
            unroll_bound: cli.unroll,
            timeout_secs: cli.timeout,
            merge: parse_merge_policy(&cli.merge)?,
            dump_smt: None,
        },
        format: parse_output_format(&cli.format)?,
    })
}

/// Read a program from `path`, or from stdin when `path` is `-`.
///
/// Returns the source and the name used in diagnostics.
pub(crate) fn read_source(path: &Path) -> miette::Result<(String, String)> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .into_diagnostic()?;
        return Ok((source, "<stdin>".to_string()));
    }
    let source = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("Cannot read {}: {e}", path.display()))?;
    Ok((source, path.display().to_string()))
}

/// Parse errors keep their source labels; everything else is plain text.
pub(crate) fn pipeline_report(err: PipelineError) -> miette::Report {
    match err {
        PipelineError::Parse(parse) => miette::Report::new(parse),
        other => miette::miette!("{other}"),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> miette::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_names_round_trip() {
        for choice in [SolverChoice::Z3, SolverChoice::Cvc5, SolverChoice::Bounded] {
            assert_eq!(parse_solver_choice(choice.name()).unwrap(), choice);
        }
    }

    #[test]
    fn unknown_names_list_accepted_ones() {
        let err = parse_solver_choice("yices").unwrap_err().to_string();
        assert!(err.contains("'bounded'"), "{err}");
        let err = parse_output_format("xml").unwrap_err().to_string();
        assert!(err.contains("'json'"), "{err}");
        let err = parse_merge_policy("dominance").unwrap_err().to_string();
        assert!(err.contains("phi"), "{err}");
    }

    #[test]
    fn merge_policy_aliases() {
        assert_eq!(parse_merge_policy("phi").unwrap(), MergePolicy::PhiAtJoin);
        assert_eq!(parse_merge_policy("last-branch-wins").unwrap(), MergePolicy::LastBranchWins);
    }

    #[test]
    fn parse_errors_keep_diagnostic_code() {
        let err = minilang_dsl::parse("x := ;", "bad.ml").unwrap_err();
        let report = pipeline_report(PipelineError::Parse(err));
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("minilang::parse::syntax"));
    }
}
