//! In-process Z3 through the `z3` crate.

use std::collections::HashMap;

use minilang_dsl::ast::{BinOp, CmpOp};
use thiserror::Error;
use tracing::debug;
use z3::ast::{Bool, Int};
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Z3 expected a {expected} term in {term:?}")]
    SortMismatch { expected: SmtSort, term: SmtTerm },
    #[error("Z3 answered sat without producing a model")]
    MissingModel,
}

#[derive(Clone)]
enum Z3Term {
    Int(Int),
    Bool(Bool),
}

/// Native Z3 backend over the crate's global context.
pub struct Z3Solver {
    solver: z3::Solver,
    consts: HashMap<String, Z3Term>,
    timeout_ms: Option<u32>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            consts: HashMap::new(),
            timeout_ms: None,
        }
    }

    /// A solver whose every check gives up after `timeout_secs` (0 disables).
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        let mut solver = Self::new();
        if timeout_secs > 0 {
            let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
            solver.timeout_ms = Some(timeout_ms);
            solver.apply_timeout();
            debug!(timeout_ms, "configured Z3 timeout");
        }
        solver
    }

    fn apply_timeout(&mut self) {
        if let Some(ms) = self.timeout_ms {
            let mut params = z3::Params::new();
            params.set_u32("timeout", ms);
            self.solver.set_params(&params);
        }
    }

    fn int(&self, term: &SmtTerm) -> Result<Int, Z3Error> {
        match self.translate(term)? {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(Z3Error::SortMismatch {
                expected: SmtSort::Int,
                term: term.clone(),
            }),
        }
    }

    fn bool(&self, term: &SmtTerm) -> Result<Bool, Z3Error> {
        match self.translate(term)? {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::SortMismatch {
                expected: SmtSort::Bool,
                term: term.clone(),
            }),
        }
    }

    fn connective(&self, terms: &[SmtTerm], conjunction: bool) -> Result<Bool, Z3Error> {
        let operands = terms.iter().map(|t| self.bool(t)).collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Bool> = operands.iter().collect();
        Ok(if conjunction {
            Bool::and(&refs)
        } else {
            Bool::or(&refs)
        })
    }

    fn translate(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        Ok(match term {
            SmtTerm::Var(name) => self
                .consts
                .get(name)
                .cloned()
                .ok_or_else(|| Z3Error::UnknownVariable(name.clone()))?,
            SmtTerm::Int(n) => Z3Term::Int(Int::from_i64(*n)),
            SmtTerm::Bool(b) => Z3Term::Bool(Bool::from_bool(*b)),
            SmtTerm::Arith(op, l, r) => {
                let (a, b) = (self.int(l)?, self.int(r)?);
                Z3Term::Int(match op {
                    BinOp::Add => &a + &b,
                    BinOp::Sub => &a - &b,
                    BinOp::Mul => &a * &b,
                    BinOp::Div => &a / &b,
                })
            }
            SmtTerm::Compare(op, l, r) => {
                let (a, b) = (self.int(l)?, self.int(r)?);
                Z3Term::Bool(match op {
                    CmpOp::Lt => a.lt(&b),
                    CmpOp::Gt => a.gt(&b),
                    CmpOp::Le => a.le(&b),
                    CmpOp::Ge => a.ge(&b),
                    CmpOp::Eq => a.eq(&b),
                    CmpOp::Ne => a.eq(&b).not(),
                })
            }
            SmtTerm::And(terms) => Z3Term::Bool(self.connective(terms, true)?),
            SmtTerm::Or(terms) => Z3Term::Bool(self.connective(terms, false)?),
            SmtTerm::Not(inner) => Z3Term::Bool(self.bool(inner)?.not()),
            SmtTerm::Implies(l, r) => Z3Term::Bool(self.bool(l)?.implies(&self.bool(r)?)),
        })
    }

    fn value_of(&self, model: &z3::Model, name: &str) -> Option<ModelValue> {
        match self.consts.get(name)? {
            Z3Term::Int(c) => model.eval::<Int>(c, true)?.as_i64().map(ModelValue::Int),
            Z3Term::Bool(c) => model.eval::<Bool>(c, true)?.as_bool().map(ModelValue::Bool),
        }
    }

    fn verdict(&self) -> SatResult {
        match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            ),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        let constant = match sort {
            SmtSort::Int => Z3Term::Int(Int::new_const(name)),
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
        };
        self.consts.insert(name.to_string(), constant);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let constraint = self.bool(term)?;
        self.solver.assert(&constraint);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        Ok(self.verdict())
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        let verdict = self.verdict();
        if verdict != SatResult::Sat {
            return Ok((verdict, None));
        }
        let z3_model = self.solver.get_model().ok_or(Z3Error::MissingModel)?;
        let values = var_names
            .iter()
            .filter_map(|&(name, _)| Some((name.to_string(), self.value_of(&z3_model, name)?)))
            .collect::<HashMap<_, _>>();
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // reset drops per-solver parameters
        self.apply_timeout();
        self.consts.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn finds_model_for_branch_sum() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x_1", &SmtSort::Int)?;
        solver.declare_var("y_1", &SmtSort::Int)?;
        solver.assert(&SmtTerm::and(vec![
            SmtTerm::var("x_1").gt(SmtTerm::int(0)),
            SmtTerm::var("y_1").gt(SmtTerm::int(0)),
            SmtTerm::var("x_1").add(SmtTerm::var("y_1")).eq(SmtTerm::int(10)),
        ]))?;
        let (result, model) =
            solver.check_sat_with_model(&[("x_1", &SmtSort::Int), ("y_1", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or("expected model")?;
        let (x, y) = (model.get_int("x_1").ok_or("x_1")?, model.get_int("y_1").ok_or("y_1")?);
        assert_eq!(x + y, 10);
        Ok(())
    }

    #[test]
    fn division_rounds_toward_negative_infinity_for_positive_divisor() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("q", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("q").eq(SmtTerm::int(-7).div(SmtTerm::int(2))))?;
        let (result, model) = solver.check_sat_with_model(&[("q", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.ok_or("expected model")?.get_int("q"), Some(-4));
        Ok(())
    }

    #[test]
    fn disequality_is_refuted_by_equality() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("a", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("a").eq(SmtTerm::int(4)))?;
        solver.assert(&SmtTerm::var("a").ne(SmtTerm::int(4)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn scopes_and_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(5);
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").gt(SmtTerm::int(0)))?;
        solver.push()?;
        solver.assert(&SmtTerm::var("x").lt(SmtTerm::int(0)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        solver.pop()?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.reset()?;
        assert!(matches!(
            solver.assert(&SmtTerm::var("x").gt(SmtTerm::int(0))),
            Err(Z3Error::UnknownVariable(_))
        ));
        Ok(())
    }

    #[test]
    fn integer_assertion_is_a_sort_error() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("n", &SmtSort::Int)?;
        assert!(matches!(
            solver.assert(&SmtTerm::var("n")),
            Err(Z3Error::SortMismatch { expected: SmtSort::Bool, .. })
        ));
        Ok(())
    }
}
