#![allow(clippy::result_large_err)]

pub mod equivalence;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use minilang_dsl::ast::Program;
use minilang_dsl::errors::ParseError;
use minilang_dsl::{parse, unroll, DEFAULT_UNROLL_BOUND};
use minilang_ir::{convert_to_ssa_with, MergePolicy, SsaError, SsaProgram};
use minilang_smt::backends::bounded::BoundedSolver;
use minilang_smt::backends::smtlib_process::SmtLibProcess;
use minilang_smt::encoder::{encode, Encoding, EncodingError, Satisfiability};
use minilang_smt::solver::SmtSolver;

use crate::result::{EquivalenceResult, VerificationResult};

pub use equivalence::{check_equivalence_with, PROGRAM1_PREFIX, PROGRAM2_PREFIX};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("SSA error: {0}")]
    Ssa(#[from] SsaError),
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    /// Native bindings with the `z3` feature, otherwise `z3 -in`.
    #[default]
    Z3,
    Cvc5,
    /// In-memory search over a small integer domain; needs no binary.
    Bounded,
}

impl SolverChoice {
    pub fn name(self) -> &'static str {
        match self {
            SolverChoice::Z3 => "z3",
            SolverChoice::Cvc5 => "cvc5",
            SolverChoice::Bounded => "bounded",
        }
    }
}

impl fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub solver: SolverChoice,
    /// Guarded copies emitted per loop.
    pub unroll_bound: usize,
    /// Per-query solver timeout; 0 disables it.
    pub timeout_secs: u64,
    pub merge: MergePolicy,
    /// Write the SMT-LIB script of each checked program here before solving.
    pub dump_smt: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            unroll_bound: DEFAULT_UNROLL_BOUND,
            timeout_secs: 30,
            merge: MergePolicy::LastBranchWins,
            dump_smt: None,
        }
    }
}

/// Every intermediate form of one source file.
#[derive(Debug, Clone)]
pub struct AnalyzedProgram {
    pub program: Program,
    pub unrolled: Program,
    pub ssa: SsaProgram,
}

/// Parse, unroll and convert `source` to SSA.
pub fn analyze_source(
    source: &str,
    filename: &str,
    options: &PipelineOptions,
) -> Result<AnalyzedProgram, PipelineError> {
    let program = parse(source, filename)?;
    let unrolled = unroll(&program, options.unroll_bound);
    let ssa = convert_to_ssa_with(&unrolled, options.merge)?;
    debug!(
        filename,
        statements = program.statements.len(),
        unrolled = unrolled.statements.len(),
        ssa = ssa.len(),
        "front end finished"
    );
    Ok(AnalyzedProgram {
        program,
        unrolled,
        ssa,
    })
}

fn solver_error(err: impl fmt::Display) -> PipelineError {
    PipelineError::Solver(err.to_string())
}

#[cfg(feature = "z3")]
fn z3_solver(timeout_secs: u64) -> Result<minilang_smt::backends::z3_backend::Z3Solver, PipelineError> {
    Ok(minilang_smt::backends::z3_backend::Z3Solver::with_timeout_secs(timeout_secs))
}

#[cfg(not(feature = "z3"))]
fn z3_solver(timeout_secs: u64) -> Result<SmtLibProcess, PipelineError> {
    SmtLibProcess::z3(timeout_secs).map_err(solver_error)
}

/// Build the configured backend as `$solver` and evaluate `$body` with it.
macro_rules! with_solver {
    ($options:expr, |$solver:ident| $body:expr) => {
        match $options.solver {
            SolverChoice::Z3 => {
                let mut $solver = z3_solver($options.timeout_secs)?;
                $body
            }
            SolverChoice::Cvc5 => {
                let mut $solver = SmtLibProcess::cvc5($options.timeout_secs).map_err(solver_error)?;
                $body
            }
            SolverChoice::Bounded => {
                let mut $solver = BoundedSolver::new();
                $body
            }
        }
    };
}

pub(crate) fn dump_smt_to_file(encoding: &Encoding, path: &Path) -> Result<(), PipelineError> {
    std::fs::write(path, encoding.to_smtlib_script())?;
    info!(path = %path.display(), "SMT dump written");
    Ok(())
}

fn satisfiability<S: SmtSolver>(
    solver: &mut S,
    encoding: &Encoding,
) -> Result<Satisfiability, PipelineError> {
    encoding.check_satisfiable(solver).map_err(solver_error)
}

/// Check that a program's constraints, assertions included, are satisfiable.
pub fn check_assertions(
    ssa: &SsaProgram,
    options: &PipelineOptions,
) -> Result<VerificationResult, PipelineError> {
    let encoding = encode(ssa)?;
    if let Some(path) = &options.dump_smt {
        dump_smt_to_file(&encoding, path)?;
    }
    let outcome = with_solver!(options, |solver| satisfiability(&mut solver, &encoding))?;
    let result = match outcome {
        Satisfiability::Sat(model) => VerificationResult::AssertionsHold { model },
        Satisfiability::Unsat => VerificationResult::Violation,
        Satisfiability::Unknown(reason) => {
            warn!(solver = %options.solver, %reason, "assertion check inconclusive");
            VerificationResult::Unknown { reason }
        }
    };
    info!(verdict = result.verdict_class(), solver = %options.solver, "assertion check finished");
    Ok(result)
}

/// Front end plus [`check_assertions`] for one source text.
pub fn verify_source(
    source: &str,
    filename: &str,
    options: &PipelineOptions,
) -> Result<VerificationResult, PipelineError> {
    let analyzed = analyze_source(source, filename, options)?;
    check_assertions(&analyzed.ssa, options)
}

/// Compare two SSA programs in one fresh solver context.
///
/// Never fails: a backend that cannot be started, or any error while
/// encoding or solving, becomes [`EquivalenceResult::Error`].
pub fn check_equivalence(
    ssa1: &SsaProgram,
    ssa2: &SsaProgram,
    options: &PipelineOptions,
) -> EquivalenceResult {
    let run = || -> Result<EquivalenceResult, PipelineError> {
        Ok(with_solver!(options, |solver| check_equivalence_with(&mut solver, ssa1, ssa2)))
    };
    let result = run().unwrap_or_else(|err| {
        warn!(error = %err, "equivalence check could not run");
        EquivalenceResult::Error {
            message: err.to_string(),
        }
    });
    info!(verdict = result.verdict_class(), solver = %options.solver, "equivalence check finished");
    result
}

/// Front end for both sources, then [`check_equivalence`].
///
/// Front-end failures are returned as errors; only encoding and solving are
/// folded into the verdict.
pub fn check_equivalence_sources(
    source1: &str,
    filename1: &str,
    source2: &str,
    filename2: &str,
    options: &PipelineOptions,
) -> Result<EquivalenceResult, PipelineError> {
    let first = analyze_source(source1, filename1, options)?;
    let second = analyze_source(source2, filename2, options)?;
    Ok(check_equivalence(&first.ssa, &second.ssa, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded() -> PipelineOptions {
        PipelineOptions {
            solver: SolverChoice::Bounded,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.unroll_bound, 3);
        assert_eq!(options.solver, SolverChoice::Z3);
        assert_eq!(options.merge, MergePolicy::LastBranchWins);
        assert!(options.dump_smt.is_none());
    }

    #[test]
    fn front_end_errors_propagate() {
        let err = verify_source("x := ;", "bad.ml", &bounded()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error: Syntax error"));
    }

    #[test]
    fn unroll_bound_is_honoured() {
        let options = PipelineOptions {
            unroll_bound: 1,
            ..bounded()
        };
        let analyzed =
            analyze_source("while (n > 0) { n := n - 1; }", "w.ml", &options).unwrap();
        assert_eq!(analyzed.unrolled.statements.len(), 1);
        assert_eq!(analyzed.program.statements.len(), 1);
        assert_eq!(analyzed.ssa.to_string(), "if (n > 0)\n  n_1 := n - 1;");
    }

    #[test]
    fn violation_is_reported_not_raised() {
        let result = verify_source("x := 1; assert(x > 2);", "v.ml", &bounded()).unwrap();
        assert_eq!(result, VerificationResult::Violation);
    }

    #[test]
    fn encoding_errors_become_equivalence_error_verdict() {
        // A free name spelled like the prefixed symbol of `x_1`.
        let clash = analyze_source("y := p1_x_1; x := 1;", "c.ml", &bounded()).unwrap();
        let plain = analyze_source("y := 1;", "p.ml", &bounded()).unwrap();
        let result = check_equivalence(&clash.ssa, &plain.ssa, &bounded());
        assert!(matches!(result, EquivalenceResult::Error { .. }), "{result:?}");
    }

    #[test]
    fn encoding_errors_propagate_from_assertion_check() {
        let clash = analyze_source("y := x_1; x := 1;", "c.ml", &bounded()).unwrap();
        let err = check_assertions(&clash.ssa, &bounded()).unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(EncodingError::SymbolClash { .. })));
    }
}
