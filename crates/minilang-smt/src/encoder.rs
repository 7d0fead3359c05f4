//! SSA to integer-constraint encoding.
//!
//! Every SSA variable becomes one `Int` symbol. A versioned variable `x_n`
//! is named `{namespace}x_n`; a free (never assigned) name keeps its bare
//! spelling, so two encodings in one solver agree on their inputs.
//!
//! The path condition is the condition of the innermost open branch region,
//! or `true` outside any region. Branch conditions and assertions are
//! emitted as `pc => cond`; assignments are emitted unguarded as
//! `sym == value`. A phi binds its target to the first defined argument.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use minilang_dsl::ast::Expr;
use minilang_ir::{SsaExpr, SsaProgram, SsaStmt, SsaValue, SsaVar};
use thiserror::Error;
use tracing::debug;

use crate::backends::smtlib_printer::{sort_to_smtlib, symbol_to_smtlib, to_smtlib};
use crate::solver::{Model, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error, PartialEq)]
pub enum EncodingError {
    #[error("phi for `{target}` has no defined argument")]
    EmptyPhi { target: String },
    #[error("expected {expected} expression, found `{found}`")]
    SortMismatch { expected: SmtSort, found: String },
    #[error("symbol `{symbol}` would stand for both `{first}` and `{second}`")]
    SymbolClash {
        symbol: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ConstraintKind {
    Assign,
    Branch,
    Assert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub term: SmtTerm,
}

/// One encoded `assert`, kept separately so callers can reason about it
/// without assuming it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAssertion {
    /// Position among the program's assertions.
    pub index: usize,
    pub condition: SsaExpr,
    pub guard: Option<SsaExpr>,
    pub guard_term: SmtTerm,
    pub condition_term: SmtTerm,
}

/// Symbol values of a model, ordered by base name then version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize), serde(transparent))]
pub struct Valuation {
    values: IndexMap<String, i64>,
}

impl Valuation {
    pub fn from_vars<'a>(entries: impl IntoIterator<Item = (&'a SsaVar, i64)>) -> Self {
        let mut entries: Vec<(&SsaVar, i64)> = entries.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.sort_key().cmp(&b.sort_key()));
        Self {
            values: entries
                .into_iter()
                .map(|(var, value)| (var.to_string(), value))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Satisfiability {
    Sat(Valuation),
    Unsat,
    Unknown(String),
}

/// The constraint set of one SSA program.
#[derive(Debug, Clone, Default)]
pub struct Encoding {
    namespace: String,
    symbols: IndexMap<String, SsaVar>,
    constraints: Vec<Constraint>,
    assertions: Vec<EncodedAssertion>,
    finals: BTreeMap<String, SsaVar>,
}

impl Encoding {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Symbols in first-use order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &SsaVar)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn assertions(&self) -> &[EncodedAssertion] {
        &self.assertions
    }

    pub fn symbol_for(&self, var: &SsaVar) -> Option<&str> {
        let name = symbol_name(&self.namespace, var);
        self.symbols.get_key_value(&name).map(|(k, _)| k.as_str())
    }

    pub fn var_for(&self, symbol: &str) -> Option<&SsaVar> {
        self.symbols.get(symbol)
    }

    /// Lexically last assignment target with this base name.
    pub fn final_version(&self, base: &str) -> Option<&SsaVar> {
        self.finals.get(base)
    }

    pub fn final_symbol(&self, base: &str) -> Option<SmtTerm> {
        self.final_version(base)
            .map(|var| SmtTerm::var(symbol_name(&self.namespace, var)))
    }

    /// Base names with at least one assignment, sorted.
    pub fn assigned_bases(&self) -> impl Iterator<Item = &str> {
        self.finals.keys().map(String::as_str)
    }

    pub fn declare_all<S: SmtSolver>(&self, solver: &mut S) -> Result<(), S::Error> {
        declare_symbols(solver, &[self])
    }

    /// Assert every constraint, assertions included.
    pub fn assert_into<S: SmtSolver>(&self, solver: &mut S) -> Result<(), S::Error> {
        for c in &self.constraints {
            solver.assert(&c.term)?;
        }
        Ok(())
    }

    /// Assert assignment and branch constraints, leaving assertions out.
    pub fn assert_program_constraints<S: SmtSolver>(&self, solver: &mut S) -> Result<(), S::Error> {
        for c in self.constraints.iter().filter(|c| c.kind != ConstraintKind::Assert) {
            solver.assert(&c.term)?;
        }
        Ok(())
    }

    /// Terms of the `pc => cond` constraints contributed by assertions.
    pub fn assertion_constraints(&self) -> impl Iterator<Item = &SmtTerm> {
        self.constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::Assert)
            .map(|c| &c.term)
    }

    /// Check the full constraint set in a fresh solver state.
    pub fn check_satisfiable<S: SmtSolver>(&self, solver: &mut S) -> Result<Satisfiability, S::Error> {
        solver.reset()?;
        self.declare_all(solver)?;
        self.assert_into(solver)?;
        let names: Vec<(&str, &SmtSort)> = self
            .symbols
            .keys()
            .map(|name| (name.as_str(), &SmtSort::Int))
            .collect();
        let (result, model) = solver.check_sat_with_model(&names)?;
        Ok(match (result, model) {
            (SatResult::Sat, Some(model)) => Satisfiability::Sat(self.valuation(&model)),
            (SatResult::Sat, None) => Satisfiability::Sat(Valuation::default()),
            (SatResult::Unsat, _) => Satisfiability::Unsat,
            (SatResult::Unknown(reason), _) => Satisfiability::Unknown(reason),
        })
    }

    /// Values of this encoding's symbols, labelled by SSA name.
    pub fn valuation(&self, model: &Model) -> Valuation {
        Valuation::from_vars(
            self.symbols
                .iter()
                .filter_map(|(name, var)| model.get_int(name).map(|v| (var, v))),
        )
    }

    /// Standalone SMT-LIB2 script for the full constraint set.
    pub fn to_smtlib_script(&self) -> String {
        let mut out = String::from("(set-logic QF_NIA)\n");
        let int = sort_to_smtlib(&SmtSort::Int);
        for name in self.symbols.keys() {
            out.push_str(&format!("(declare-const {} {int})\n", symbol_to_smtlib(name)));
        }
        for c in &self.constraints {
            out.push_str(&format!("(assert {})\n", to_smtlib(&c.term)));
        }
        out.push_str("(check-sat)\n");
        out
    }
}

/// Declare the union of the encodings' symbols once each.
pub fn declare_symbols<S: SmtSolver>(solver: &mut S, encodings: &[&Encoding]) -> Result<(), S::Error> {
    let mut seen = HashSet::new();
    for encoding in encodings {
        for name in encoding.symbols.keys() {
            if seen.insert(name.as_str()) {
                solver.declare_var(name, &SmtSort::Int)?;
            }
        }
    }
    Ok(())
}

/// Reject two encodings that would give one symbol two meanings.
pub fn check_disjoint(a: &Encoding, b: &Encoding) -> Result<(), EncodingError> {
    for (name, var) in &b.symbols {
        if let Some(other) = a.symbols.get(name) {
            if other != var {
                return Err(EncodingError::SymbolClash {
                    symbol: name.clone(),
                    first: other.to_string(),
                    second: var.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn symbol_name(namespace: &str, var: &SsaVar) -> String {
    match var {
        SsaVar::Versioned { .. } => format!("{namespace}{var}"),
        SsaVar::Free(name) => name.clone(),
    }
}

pub fn encode(program: &SsaProgram) -> Result<Encoding, EncodingError> {
    encode_with_namespace(program, "")
}

/// Encode with every versioned symbol prefixed by `namespace`.
pub fn encode_with_namespace(program: &SsaProgram, namespace: &str) -> Result<Encoding, EncodingError> {
    let mut encoder = Encoder {
        namespace,
        symbols: IndexMap::new(),
        constraints: Vec::with_capacity(program.len()),
        assertions: Vec::new(),
    };

    for scoped in program.scoped() {
        let pc = match scoped.guard {
            Some(guard) => encoder.bool_term(guard)?,
            None => SmtTerm::bool(true),
        };
        match scoped.stmt {
            SsaStmt::Assign { target, value } => {
                let sym = encoder.symbol(target)?;
                let rhs = match value {
                    SsaValue::Expr(expr) => encoder.int_term(expr)?,
                    SsaValue::Phi(a, b) => {
                        let arg = a.as_ref().or(b.as_ref()).ok_or_else(|| EncodingError::EmptyPhi {
                            target: target.to_string(),
                        })?;
                        encoder.symbol(arg)?
                    }
                };
                encoder.push(ConstraintKind::Assign, sym.eq(rhs));
            }
            SsaStmt::Branch { condition, .. } => {
                let cond = encoder.bool_term(condition)?;
                encoder.push(ConstraintKind::Branch, pc.implies(cond));
            }
            SsaStmt::Assert { condition } => {
                let cond = encoder.bool_term(condition)?;
                encoder.assertions.push(EncodedAssertion {
                    index: encoder.assertions.len(),
                    condition: condition.clone(),
                    guard: scoped.guard.cloned(),
                    guard_term: pc.clone(),
                    condition_term: cond.clone(),
                });
                encoder.push(ConstraintKind::Assert, pc.implies(cond));
            }
        }
    }

    let mut finals = BTreeMap::new();
    for base in program.assigned_bases() {
        if let Some(var) = program.final_version(base) {
            finals.insert(base.to_string(), var.clone());
        }
    }

    debug!(
        namespace,
        symbols = encoder.symbols.len(),
        constraints = encoder.constraints.len(),
        assertions = encoder.assertions.len(),
        "encoded SSA program"
    );
    Ok(Encoding {
        namespace: namespace.to_string(),
        symbols: encoder.symbols,
        constraints: encoder.constraints,
        assertions: encoder.assertions,
        finals,
    })
}

struct Encoder<'a> {
    namespace: &'a str,
    symbols: IndexMap<String, SsaVar>,
    constraints: Vec<Constraint>,
    assertions: Vec<EncodedAssertion>,
}

impl Encoder<'_> {
    fn push(&mut self, kind: ConstraintKind, term: SmtTerm) {
        self.constraints.push(Constraint { kind, term });
    }

    fn symbol(&mut self, var: &SsaVar) -> Result<SmtTerm, EncodingError> {
        let name = symbol_name(self.namespace, var);
        match self.symbols.get(&name) {
            Some(existing) if existing != var => {
                return Err(EncodingError::SymbolClash {
                    symbol: name,
                    first: existing.to_string(),
                    second: var.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.symbols.insert(name.clone(), var.clone());
            }
        }
        Ok(SmtTerm::var(name))
    }

    fn int_term(&mut self, expr: &SsaExpr) -> Result<SmtTerm, EncodingError> {
        match expr {
            Expr::Int(n) => Ok(SmtTerm::int(*n)),
            Expr::Var(var) => self.symbol(var),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.int_term(lhs)?;
                let r = self.int_term(rhs)?;
                Ok(SmtTerm::arith(*op, l, r))
            }
            Expr::Compare { .. } => Err(EncodingError::SortMismatch {
                expected: SmtSort::Int,
                found: expr.to_string(),
            }),
        }
    }

    fn bool_term(&mut self, expr: &SsaExpr) -> Result<SmtTerm, EncodingError> {
        match expr {
            Expr::Compare { op, lhs, rhs } => {
                let l = self.int_term(lhs)?;
                let r = self.int_term(rhs)?;
                Ok(SmtTerm::compare(*op, l, r))
            }
            _ => Err(EncodingError::SortMismatch {
                expected: SmtSort::Bool,
                found: expr.to_string(),
            }),
        }
    }
}
