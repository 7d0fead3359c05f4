//! In-memory backtracking solver over a bounded integer domain.
//!
//! Unassigned integer variables are tried in the order 0, 1, -1, 2, -2, ...
//! within the configured domain. Before branching, any conjunct of the form
//! `v = e` whose right side is already fully known assigns `v` directly, so
//! SSA definition chains are resolved without search (and may take values
//! outside the domain). `Unsat` therefore means "no model with every searched
//! variable in the domain", and a search that exceeds its node budget answers
//! `Unknown`.
//!
//! Arithmetic is checked `i64`. `div` is Euclidean like SMT-LIB, division by
//! zero evaluates to 0, and a constraint whose evaluation overflows is false.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use indexmap::IndexMap;
use minilang_dsl::ast::{BinOp, CmpOp};
use thiserror::Error;
use tracing::{debug, warn};

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

pub const DEFAULT_DOMAIN: RangeInclusive<i64> = -32..=32;
pub const DEFAULT_NODE_BUDGET: u64 = 2_000_000;

#[derive(Debug, Error, PartialEq)]
pub enum BoundedError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
    #[error("pop without a matching push")]
    PopWithoutPush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Int(i64),
    Bool(bool),
}

/// Evaluation under a partial assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eval {
    Known(Value),
    /// Depends on a variable that is not assigned yet.
    Pending,
    /// Overflowed (or was ill-sorted); the enclosing constraint is false.
    Undefined,
}

type Env = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Found,
    Exhausted,
    OutOfBudget,
}

pub struct BoundedSolver {
    domain: RangeInclusive<i64>,
    node_budget: u64,
    vars: IndexMap<String, SmtSort>,
    assertions: Vec<SmtTerm>,
    frames: Vec<(usize, usize)>,
    model: Option<Env>,
}

impl BoundedSolver {
    pub fn new() -> Self {
        Self::with_domain(DEFAULT_DOMAIN, DEFAULT_NODE_BUDGET)
    }

    pub fn with_domain(domain: RangeInclusive<i64>, node_budget: u64) -> Self {
        Self {
            domain,
            node_budget,
            vars: IndexMap::new(),
            assertions: Vec::new(),
            frames: Vec::new(),
            model: None,
        }
    }

    fn sort_of(&self, term: &SmtTerm) -> Result<SmtSort, BoundedError> {
        let expect = |t: &SmtTerm, want: SmtSort| -> Result<(), BoundedError> {
            let got = self.sort_of(t)?;
            if got == want {
                Ok(())
            } else {
                Err(BoundedError::SortMismatch(format!(
                    "expected {want}, found {got} in {t:?}"
                )))
            }
        };
        match term {
            SmtTerm::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| BoundedError::UnknownVariable(name.clone())),
            SmtTerm::Int(_) => Ok(SmtSort::Int),
            SmtTerm::Bool(_) => Ok(SmtSort::Bool),
            SmtTerm::Arith(_, l, r) => {
                expect(l, SmtSort::Int)?;
                expect(r, SmtSort::Int)?;
                Ok(SmtSort::Int)
            }
            SmtTerm::Compare(_, l, r) => {
                expect(l, SmtSort::Int)?;
                expect(r, SmtSort::Int)?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::Implies(l, r) => {
                expect(l, SmtSort::Bool)?;
                expect(r, SmtSort::Bool)?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                for t in terms {
                    expect(t, SmtSort::Bool)?;
                }
                Ok(SmtSort::Bool)
            }
            SmtTerm::Not(inner) => {
                expect(inner, SmtSort::Bool)?;
                Ok(SmtSort::Bool)
            }
        }
    }
}

impl Default for BoundedSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer candidates nearest zero first, restricted to `lo..=hi`.
fn candidates(lo: i64, hi: i64) -> impl Iterator<Item = i64> {
    let anchor = (lo <= hi).then(|| 0i64.clamp(lo, hi));
    let mut step: i64 = 0;
    let mut queued: Option<i64> = None;
    std::iter::from_fn(move || {
        let anchor = anchor?;
        loop {
            if let Some(v) = queued.take() {
                return Some(v);
            }
            if step == 0 {
                step = 1;
                return Some(anchor);
            }
            let up = anchor.checked_add(step).filter(|v| *v <= hi);
            let down = anchor.checked_sub(step).filter(|v| *v >= lo);
            if up.is_none() && down.is_none() {
                return None;
            }
            step = step.checked_add(1)?;
            queued = down;
            if up.is_some() {
                return up;
            }
        }
    })
}

fn euclid_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        Some(0)
    } else {
        a.checked_div_euclid(b)
    }
}

fn arith(l: &SmtTerm, r: &SmtTerm, env: &Env, op: fn(i64, i64) -> Option<i64>) -> Eval {
    match (eval(l, env), eval(r, env)) {
        (Eval::Undefined, _) | (_, Eval::Undefined) => Eval::Undefined,
        (Eval::Known(Value::Int(a)), Eval::Known(Value::Int(b))) => {
            op(a, b).map_or(Eval::Undefined, |v| Eval::Known(Value::Int(v)))
        }
        (Eval::Known(Value::Bool(_)), _) | (_, Eval::Known(Value::Bool(_))) => Eval::Undefined,
        _ => Eval::Pending,
    }
}

fn relation(l: &SmtTerm, r: &SmtTerm, env: &Env, op: fn(&i64, &i64) -> bool) -> Eval {
    match (eval(l, env), eval(r, env)) {
        (Eval::Undefined, _) | (_, Eval::Undefined) => Eval::Undefined,
        (Eval::Known(Value::Int(a)), Eval::Known(Value::Int(b))) => {
            Eval::Known(Value::Bool(op(&a, &b)))
        }
        (Eval::Known(Value::Bool(_)), _) | (_, Eval::Known(Value::Bool(_))) => Eval::Undefined,
        _ => Eval::Pending,
    }
}

/// `Some(b)` once decided; undefined evaluation counts as false.
fn truth(e: Eval) -> Option<bool> {
    match e {
        Eval::Known(Value::Bool(b)) => Some(b),
        Eval::Pending => None,
        Eval::Known(Value::Int(_)) | Eval::Undefined => Some(false),
    }
}

fn eval(term: &SmtTerm, env: &Env) -> Eval {
    match term {
        SmtTerm::Var(name) => env.get(name).map_or(Eval::Pending, |v| Eval::Known(*v)),
        SmtTerm::Int(n) => Eval::Known(Value::Int(*n)),
        SmtTerm::Bool(b) => Eval::Known(Value::Bool(*b)),
        SmtTerm::Arith(op, l, r) => arith(l, r, env, match op {
            BinOp::Add => i64::checked_add,
            BinOp::Sub => i64::checked_sub,
            BinOp::Mul => i64::checked_mul,
            BinOp::Div => euclid_div,
        }),
        SmtTerm::Compare(op, l, r) => relation(l, r, env, match op {
            CmpOp::Lt => i64::lt,
            CmpOp::Gt => i64::gt,
            CmpOp::Le => i64::le,
            CmpOp::Ge => i64::ge,
            CmpOp::Eq => i64::eq,
            CmpOp::Ne => i64::ne,
        }),
        SmtTerm::Not(inner) => match eval(inner, env) {
            Eval::Known(Value::Bool(b)) => Eval::Known(Value::Bool(!b)),
            Eval::Pending => Eval::Pending,
            Eval::Known(Value::Int(_)) | Eval::Undefined => Eval::Undefined,
        },
        SmtTerm::And(terms) => connective(terms, env, false),
        SmtTerm::Or(terms) => connective(terms, env, true),
        SmtTerm::Implies(l, r) => {
            let (a, b) = (eval(l, env), eval(r, env));
            if a == Eval::Undefined || b == Eval::Undefined {
                return Eval::Undefined;
            }
            match (truth(a), truth(b)) {
                (Some(false), _) | (_, Some(true)) => Eval::Known(Value::Bool(true)),
                (Some(true), Some(false)) => Eval::Known(Value::Bool(false)),
                _ => Eval::Pending,
            }
        }
    }
}

/// `And` when `absorbing` is false, `Or` when it is true.
fn connective(terms: &[SmtTerm], env: &Env, absorbing: bool) -> Eval {
    let mut pending = false;
    let mut absorbed = false;
    for t in terms {
        let e = eval(t, env);
        if e == Eval::Undefined {
            return Eval::Undefined;
        }
        match truth(e) {
            Some(b) if b == absorbing => absorbed = true,
            Some(_) => {}
            None => pending = true,
        }
    }
    if absorbed {
        Eval::Known(Value::Bool(absorbing))
    } else if pending {
        Eval::Pending
    } else {
        Eval::Known(Value::Bool(!absorbing))
    }
}

/// A conjunct `v = e` with `v` unassigned and `e` known.
fn forced<'t>(term: &'t SmtTerm, env: &Env) -> Option<(&'t str, Value)> {
    match term {
        SmtTerm::And(terms) => terms.iter().find_map(|t| forced(t, env)),
        SmtTerm::Implies(l, r) if eval(l, env) == Eval::Known(Value::Bool(true)) => forced(r, env),
        SmtTerm::Compare(CmpOp::Eq, l, r) => solve_for(l, r, env).or_else(|| solve_for(r, l, env)),
        _ => None,
    }
}

fn solve_for<'t>(target: &'t SmtTerm, other: &SmtTerm, env: &Env) -> Option<(&'t str, Value)> {
    let SmtTerm::Var(name) = target else {
        return None;
    };
    if env.contains_key(name) {
        return None;
    }
    match eval(other, env) {
        Eval::Known(v) => Some((name.as_str(), v)),
        _ => None,
    }
}

/// Variables that appear as a side of a top-level equality.
fn collect_defined<'t>(term: &'t SmtTerm, out: &mut HashSet<&'t str>) {
    match term {
        SmtTerm::And(terms) => terms.iter().for_each(|t| collect_defined(t, out)),
        SmtTerm::Implies(_, r) => collect_defined(r, out),
        SmtTerm::Compare(CmpOp::Eq, l, r) => {
            for side in [l, r] {
                if let SmtTerm::Var(name) = &**side {
                    out.insert(name.as_str());
                }
            }
        }
        _ => {}
    }
}

struct Search<'a> {
    solver: &'a BoundedSolver,
    defined: HashSet<&'a str>,
    nodes: u64,
}

impl<'a> Search<'a> {
    fn new(solver: &'a BoundedSolver) -> Self {
        let mut defined = HashSet::new();
        for a in &solver.assertions {
            collect_defined(a, &mut defined);
        }
        Self {
            solver,
            defined,
            nodes: 0,
        }
    }

    /// Prefer variables nothing defines; defined ones usually get propagated.
    fn next_var(&self, env: &Env) -> Option<(&'a str, &'a SmtSort)> {
        let solver = self.solver;
        let mut unassigned = solver
            .vars
            .iter()
            .filter(|(name, _)| !env.contains_key(name.as_str()));
        let first = unassigned.clone().next();
        unassigned
            .find(|(name, _)| !self.defined.contains(name.as_str()))
            .or(first)
            .map(|(name, sort)| (name.as_str(), sort))
    }

    fn run(&mut self, env: &mut Env) -> Outcome {
        let solver = self.solver;
        let mut all_true = true;
        for a in &solver.assertions {
            match truth(eval(a, env)) {
                Some(false) => return Outcome::Exhausted,
                Some(true) => {}
                None => all_true = false,
            }
        }
        if self.nodes >= solver.node_budget {
            return Outcome::OutOfBudget;
        }

        if !all_true {
            if let Some((name, value)) = solver.assertions.iter().find_map(|a| forced(a, env)) {
                self.nodes += 1;
                env.insert(name.to_string(), value);
                let outcome = self.run(env);
                if outcome != Outcome::Found {
                    env.remove(name);
                }
                return outcome;
            }
        }

        let Some((name, sort)) = self.next_var(env) else {
            return if all_true {
                Outcome::Found
            } else {
                Outcome::Exhausted
            };
        };
        let values: Box<dyn Iterator<Item = Value>> = match sort {
            SmtSort::Bool => Box::new([false, true].into_iter().map(Value::Bool)),
            SmtSort::Int => {
                let domain = &solver.domain;
                Box::new(candidates(*domain.start(), *domain.end()).map(Value::Int))
            }
        };
        for value in values {
            if self.nodes >= solver.node_budget {
                return Outcome::OutOfBudget;
            }
            self.nodes += 1;
            env.insert(name.to_string(), value);
            match self.run(env) {
                Outcome::Exhausted => {}
                other => return other,
            }
        }
        env.remove(name);
        Outcome::Exhausted
    }
}

impl SmtSolver for BoundedSolver {
    type Error = BoundedError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), BoundedError> {
        match self.vars.get(name) {
            Some(existing) if existing != sort => Err(BoundedError::SortMismatch(format!(
                "{name} already declared as {existing}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.vars.insert(name.to_string(), sort.clone());
                Ok(())
            }
        }
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), BoundedError> {
        match self.sort_of(term)? {
            SmtSort::Bool => {
                self.assertions.push(term.clone());
                Ok(())
            }
            SmtSort::Int => Err(BoundedError::SortMismatch(format!(
                "asserted term is Int: {term:?}"
            ))),
        }
    }

    fn push(&mut self) -> Result<(), BoundedError> {
        self.frames.push((self.vars.len(), self.assertions.len()));
        Ok(())
    }

    fn pop(&mut self) -> Result<(), BoundedError> {
        let (vars, assertions) = self.frames.pop().ok_or(BoundedError::PopWithoutPush)?;
        self.vars.truncate(vars);
        self.assertions.truncate(assertions);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, BoundedError> {
        let mut env = Env::new();
        let mut search = Search::new(self);
        let outcome = search.run(&mut env);
        let nodes = search.nodes;
        debug!(
            vars = self.vars.len(),
            assertions = self.assertions.len(),
            nodes,
            ?outcome,
            "bounded search finished"
        );
        self.model = None;
        Ok(match outcome {
            Outcome::Found => {
                self.model = Some(env);
                SatResult::Sat
            }
            Outcome::Exhausted => SatResult::Unsat,
            Outcome::OutOfBudget => {
                warn!(budget = self.node_budget, "bounded search ran out of budget");
                SatResult::Unknown(format!(
                    "bounded search exceeded {} nodes",
                    self.node_budget
                ))
            }
        })
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), BoundedError> {
        let result = self.check_sat()?;
        let Some(env) = self.model.as_ref().filter(|_| result == SatResult::Sat) else {
            return Ok((result, None));
        };
        let mut values = HashMap::new();
        for &(name, _) in var_names {
            let value = match env.get(name) {
                Some(Value::Int(n)) => ModelValue::Int(*n),
                Some(Value::Bool(b)) => ModelValue::Bool(*b),
                None => continue,
            };
            values.insert(name.to_string(), value);
        }
        Ok((result, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), BoundedError> {
        self.vars.clear();
        self.assertions.clear();
        self.frames.clear();
        self.model = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SmtTerm {
        SmtTerm::var("x")
    }

    fn int_solver(names: &[&str]) -> BoundedSolver {
        let mut solver = BoundedSolver::new();
        for name in names {
            solver.declare_var(name, &SmtSort::Int).unwrap();
        }
        solver
    }

    #[test]
    fn candidate_order_starts_at_zero_and_alternates() {
        let first: Vec<i64> = candidates(-32, 32).take(5).collect();
        assert_eq!(first, vec![0, 1, -1, 2, -2]);
        assert_eq!(candidates(3, 5).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(candidates(-2, -1).collect::<Vec<_>>(), vec![-1, -2]);
        assert_eq!(candidates(1, 0).count(), 0);
        assert_eq!(candidates(-32, 32).count(), 65);
    }

    #[test]
    fn definition_chain_is_propagated() {
        let mut s = int_solver(&["x_1", "y_1", "z_1"]);
        s.assert(&SmtTerm::var("x_1").eq(SmtTerm::int(10))).unwrap();
        s.assert(&SmtTerm::var("y_1").eq(SmtTerm::int(5))).unwrap();
        s.assert(&SmtTerm::bool(true).implies(SmtTerm::var("x_1").gt(SmtTerm::var("y_1"))))
            .unwrap();
        s.assert(&SmtTerm::var("z_1").eq(SmtTerm::var("x_1").add(SmtTerm::var("y_1"))))
            .unwrap();
        let vars = [
            ("x_1", &SmtSort::Int),
            ("y_1", &SmtSort::Int),
            ("z_1", &SmtSort::Int),
        ];
        let (result, model) = s.check_sat_with_model(&vars).unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = model.unwrap();
        assert_eq!(model.get_int("x_1"), Some(10));
        assert_eq!(model.get_int("y_1"), Some(5));
        assert_eq!(model.get_int("z_1"), Some(15));
    }

    #[test]
    fn propagated_values_may_leave_the_domain() {
        let mut s = int_solver(&["big"]);
        s.assert(&SmtTerm::var("big").eq(SmtTerm::int(1000).mul(SmtTerm::int(1000))))
            .unwrap();
        let (result, model) = s.check_sat_with_model(&[("big", &SmtSort::Int)]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.unwrap().get_int("big"), Some(1_000_000));
    }

    #[test]
    fn free_variable_is_searched() {
        let mut s = int_solver(&["n", "sq"]);
        s.assert(&SmtTerm::var("sq").eq(SmtTerm::var("n").mul(SmtTerm::var("n"))))
            .unwrap();
        s.assert(&SmtTerm::var("sq").eq(SmtTerm::int(25))).unwrap();
        s.assert(&SmtTerm::var("n").lt(SmtTerm::int(0))).unwrap();
        let (result, model) = s.check_sat_with_model(&[("n", &SmtSort::Int)]).unwrap();
        assert_eq!(result, SatResult::Sat);
        assert_eq!(model.unwrap().get_int("n"), Some(-5));
    }

    #[test]
    fn contradiction_is_unsat() {
        let mut s = int_solver(&["x"]);
        s.assert(&x().gt(SmtTerm::int(0))).unwrap();
        s.assert(&x().lt(SmtTerm::int(0))).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn division_is_euclidean_and_total() {
        let mut s = int_solver(&["q", "z"]);
        s.assert(&SmtTerm::var("q").eq(SmtTerm::int(-7).div(SmtTerm::int(2))))
            .unwrap();
        s.assert(&SmtTerm::var("z").eq(SmtTerm::int(5).div(SmtTerm::int(0))))
            .unwrap();
        let vars = [("q", &SmtSort::Int), ("z", &SmtSort::Int)];
        let (_, model) = s.check_sat_with_model(&vars).unwrap();
        let model = model.unwrap();
        assert_eq!(model.get_int("q"), Some(-4));
        assert_eq!(model.get_int("z"), Some(0));
    }

    #[test]
    fn overflow_falsifies_constraint() {
        let mut s = int_solver(&["x"]);
        s.assert(&x().eq(SmtTerm::int(i64::MAX).add(SmtTerm::int(1)))).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);

        let mut negated = int_solver(&["x"]);
        negated
            .assert(&x().eq(SmtTerm::int(i64::MAX).add(SmtTerm::int(1))).not())
            .unwrap();
        assert_eq!(negated.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn exceeding_budget_is_unknown() {
        let mut s = BoundedSolver::with_domain(-1000..=1000, 50);
        for name in ["a", "b"] {
            s.declare_var(name, &SmtSort::Int).unwrap();
        }
        s.assert(&SmtTerm::var("a").mul(SmtTerm::var("b")).eq(SmtTerm::int(997 * 991)))
            .unwrap();
        assert!(matches!(s.check_sat().unwrap(), SatResult::Unknown(_)));
    }

    #[test]
    fn push_pop_restores_assertions_and_declarations() {
        let mut s = int_solver(&["x"]);
        s.assert(&x().ge(SmtTerm::int(0))).unwrap();
        s.push().unwrap();
        s.declare_var("y", &SmtSort::Int).unwrap();
        s.assert(&x().lt(SmtTerm::int(0))).unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        s.pop().unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(
            s.assert(&SmtTerm::var("y").eq(SmtTerm::int(1))),
            Err(BoundedError::UnknownVariable("y".into()))
        );
        assert_eq!(s.pop(), Err(BoundedError::PopWithoutPush));
    }

    #[test]
    fn ill_sorted_assertions_are_rejected() {
        let mut s = int_solver(&["x"]);
        assert!(matches!(
            s.assert(&x().add(SmtTerm::int(1))),
            Err(BoundedError::SortMismatch(_))
        ));
        assert!(matches!(
            s.assert(&SmtTerm::and(vec![x()])),
            Err(BoundedError::SortMismatch(_))
        ));
        assert!(matches!(
            s.declare_var("x", &SmtSort::Bool),
            Err(BoundedError::SortMismatch(_))
        ));
    }

    #[test]
    fn booleans_and_disjunction() {
        let mut s = BoundedSolver::new();
        s.declare_var("p", &SmtSort::Bool).unwrap();
        s.declare_var("x", &SmtSort::Int).unwrap();
        s.assert(&SmtTerm::or(vec![
            SmtTerm::var("p").not(),
            x().eq(SmtTerm::int(3)),
        ]))
        .unwrap();
        s.assert(&SmtTerm::var("p")).unwrap();
        let vars = [("p", &SmtSort::Bool), ("x", &SmtSort::Int)];
        let (result, model) = s.check_sat_with_model(&vars).unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = model.unwrap();
        assert_eq!(model.get_bool("p"), Some(true));
        assert_eq!(model.get_int("x"), Some(3));
    }

    #[test]
    fn reset_forgets_everything() {
        let mut s = int_solver(&["x"]);
        s.assert(&x().eq(SmtTerm::int(1))).unwrap();
        s.push().unwrap();
        s.reset().unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(s.pop(), Err(BoundedError::PopWithoutPush));
    }
}
