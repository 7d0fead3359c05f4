//! Two-program comparison in one solver context.
//!
//! Both programs are encoded with distinct prefixes on their versioned
//! symbols, while free names stay bare and therefore act as shared inputs.
//! Assignment and branch constraints are asserted once for the whole check.
//!
//! The check runs in two phases and stops at the first divergence:
//!
//! 1. for every base name assigned by both programs (in sorted order), is
//!    `final1 != final2` satisfiable together with both programs'
//!    assertion constraints?
//! 2. for every positional pair of assertions, can one hold under its guard
//!    while the other fails, or the other way round? Assertions are not
//!    assumed here, since that would rule out any disagreement.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, warn};

use minilang_ir::{SsaProgram, SsaVar};
use minilang_smt::encoder::{
    check_disjoint, declare_symbols, encode_with_namespace, EncodedAssertion, Encoding,
    EncodingError, Valuation,
};
use minilang_smt::solver::{Model, SatResult, SmtSolver};
use minilang_smt::sorts::SmtSort;
use minilang_smt::terms::SmtTerm;

use crate::result::{AssertionSide, EquivalenceResult, Witness};

pub const PROGRAM1_PREFIX: &str = "p1_";
pub const PROGRAM2_PREFIX: &str = "p2_";

/// Rendering of an absent guard.
const UNGUARDED: &str = "always";

#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("solver failure: {0}")]
    Solver(String),
    #[error("solver returned unknown while {query}: {reason}")]
    Inconclusive { query: String, reason: String },
}

fn solver_failure(err: impl std::fmt::Display) -> CheckError {
    CheckError::Solver(err.to_string())
}

/// Compare `ssa1` and `ssa2` using `solver`, which is reset first.
///
/// Errors are folded into [`EquivalenceResult::Error`].
pub fn check_equivalence_with<S: SmtSolver>(
    solver: &mut S,
    ssa1: &SsaProgram,
    ssa2: &SsaProgram,
) -> EquivalenceResult {
    match compare(solver, ssa1, ssa2) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "equivalence check failed");
            EquivalenceResult::Error {
                message: err.to_string(),
            }
        }
    }
}

struct Comparison<'a, S> {
    solver: &'a mut S,
    first: Encoding,
    second: Encoding,
    /// Every symbol of both encodings, each once.
    symbols: Vec<String>,
}

fn compare<S: SmtSolver>(
    solver: &mut S,
    ssa1: &SsaProgram,
    ssa2: &SsaProgram,
) -> Result<EquivalenceResult, CheckError> {
    let first = encode_with_namespace(ssa1, PROGRAM1_PREFIX)?;
    let second = encode_with_namespace(ssa2, PROGRAM2_PREFIX)?;
    check_disjoint(&first, &second)?;

    let common: BTreeSet<String> = {
        let theirs: BTreeSet<&str> = second.assigned_bases().collect();
        first
            .assigned_bases()
            .filter(|base| theirs.contains(base))
            .map(str::to_string)
            .collect()
    };
    if common.is_empty() {
        debug!("no common assigned variables");
        return Ok(EquivalenceResult::NoCommonVariables);
    }

    solver.reset().map_err(solver_failure)?;
    declare_symbols(solver, &[&first, &second]).map_err(solver_failure)?;
    first
        .assert_program_constraints(solver)
        .map_err(solver_failure)?;
    second
        .assert_program_constraints(solver)
        .map_err(solver_failure)?;

    let mut symbols: Vec<String> = first.symbols().map(|(name, _)| name.to_string()).collect();
    for (name, _) in second.symbols() {
        if !symbols.iter().any(|seen| seen == name) {
            symbols.push(name.to_string());
        }
    }

    let mut comparison = Comparison {
        solver,
        first,
        second,
        symbols,
    };

    for base in &common {
        if let Some(result) = comparison.value_divergence(base)? {
            return Ok(result);
        }
    }

    let pairs = comparison
        .first
        .assertions()
        .len()
        .min(comparison.second.assertions().len());
    for index in 0..pairs {
        if let Some(result) = comparison.assertion_divergence(index)? {
            return Ok(result);
        }
    }

    Ok(EquivalenceResult::Equivalent)
}

impl<S: SmtSolver> Comparison<'_, S> {
    /// Check `query` in a pushed scope, returning the model when satisfiable.
    fn satisfiable(&mut self, query: SmtTerm, what: &str) -> Result<Option<Model>, CheckError> {
        self.solver.push().map_err(solver_failure)?;
        let outcome = self.check(&query);
        self.solver.pop().map_err(solver_failure)?;
        match outcome? {
            (SatResult::Sat, model) => Ok(Some(model.unwrap_or_default())),
            (SatResult::Unsat, _) => Ok(None),
            (SatResult::Unknown(reason), _) => Err(CheckError::Inconclusive {
                query: what.to_string(),
                reason,
            }),
        }
    }

    fn check(&mut self, query: &SmtTerm) -> Result<(SatResult, Option<Model>), CheckError> {
        self.solver.assert(query).map_err(solver_failure)?;
        let names: Vec<(&str, &SmtSort)> = self
            .symbols
            .iter()
            .map(|name| (name.as_str(), &SmtSort::Int))
            .collect();
        self.solver
            .check_sat_with_model(&names)
            .map_err(solver_failure)
    }

    fn value_divergence(&mut self, base: &str) -> Result<Option<EquivalenceResult>, CheckError> {
        let (Some(left), Some(right)) = (self.first.final_symbol(base), self.second.final_symbol(base))
        else {
            return Ok(None);
        };
        let mut query: Vec<SmtTerm> = self
            .first
            .assertion_constraints()
            .chain(self.second.assertion_constraints())
            .cloned()
            .collect();
        query.push(left.ne(right));
        let what = format!("comparing `{base}`");
        let model = self.satisfiable(SmtTerm::and(query), &what)?;
        Ok(model.map(|model| {
            debug!(variable = base, "final values can differ");
            EquivalenceResult::ValueDivergence {
                variable: base.to_string(),
                witness: self.witness(&model),
            }
        }))
    }

    fn assertion_divergence(
        &mut self,
        index: usize,
    ) -> Result<Option<EquivalenceResult>, CheckError> {
        let a = &self.first.assertions()[index];
        let b = &self.second.assertions()[index];
        let query = SmtTerm::or(vec![
            SmtTerm::and(vec![
                a.guard_term.clone(),
                a.condition_term.clone(),
                b.condition_term.clone().not(),
            ]),
            SmtTerm::and(vec![
                b.guard_term.clone(),
                a.condition_term.clone().not(),
                b.condition_term.clone(),
            ]),
        ]);
        let (side1, side2) = (side(a), side(b));
        let what = format!("comparing assertion {}", index + 1);
        let model = self.satisfiable(query, &what)?;
        Ok(model.map(|model| {
            debug!(index, "assertions can disagree");
            EquivalenceResult::AssertionDivergence {
                index,
                program1: side1,
                program2: side2,
                witness: self.witness(&model),
            }
        }))
    }

    fn witness(&self, model: &Model) -> Witness {
        Witness {
            inputs: inputs(&self.first, &self.second, model),
            program1: versioned(&self.first, model),
            program2: versioned(&self.second, model),
        }
    }
}

fn side(assertion: &EncodedAssertion) -> AssertionSide {
    AssertionSide {
        assertion: assertion.condition.to_string(),
        guard: assertion
            .guard
            .as_ref()
            .map_or_else(|| UNGUARDED.to_string(), ToString::to_string),
    }
}

/// Free names of either program.
fn inputs(first: &Encoding, second: &Encoding, model: &Model) -> Valuation {
    let mut free: Vec<(&SsaVar, i64)> = Vec::new();
    for (name, var) in first.symbols().chain(second.symbols()) {
        if !var.is_free() || free.iter().any(|(seen, _)| *seen == var) {
            continue;
        }
        if let Some(value) = model.get_int(name) {
            free.push((var, value));
        }
    }
    Valuation::from_vars(free)
}

fn versioned(encoding: &Encoding, model: &Model) -> Valuation {
    Valuation::from_vars(encoding.symbols().filter_map(|(name, var)| {
        if var.is_free() {
            None
        } else {
            model.get_int(name).map(|value| (var, value))
        }
    }))
}
