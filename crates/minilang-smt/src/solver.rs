use std::collections::HashMap;
use std::fmt;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Answer to a satisfiability query.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The backend gave up; the string says why (timeout, search limit, ...).
    Unknown(String),
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatResult::Sat => f.write_str("sat"),
            SatResult::Unsat => f.write_str("unsat"),
            SatResult::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Values a backend chose for the symbols it was asked about.
///
/// Symbols the backend could not evaluate are simply absent.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            ModelValue::Int(n) => Some(*n),
            ModelValue::Bool(_) => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            ModelValue::Bool(b) => Some(*b),
            ModelValue::Int(_) => None,
        }
    }
}

/// A backend that decides integer constraint problems.
///
/// Symbols are declared before any assertion mentions them. `push`/`pop`
/// bracket the per-query constraints so one declared program can be asked
/// several questions in a row; `reset` forgets declarations too.
pub trait SmtSolver {
    type Error: std::error::Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Add a Boolean constraint to the current scope.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    fn push(&mut self) -> Result<(), Self::Error>;

    /// Drop every assertion made since the matching `push`.
    fn pop(&mut self) -> Result<(), Self::Error>;

    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Like [`SmtSolver::check_sat`], also reading back `var_names` when the
    /// answer is sat.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("unbalanced pop")]
    struct UnbalancedPop;

    /// Answers queries from a fixed script and records what was asked.
    struct ScriptedSolver {
        answers: Vec<SatResult>,
        declared: Vec<String>,
        asserted: Vec<SmtTerm>,
        marks: Vec<usize>,
        queries: Vec<Vec<SmtTerm>>,
    }

    impl ScriptedSolver {
        fn answering(answers: &[SatResult]) -> Self {
            Self {
                answers: answers.iter().rev().cloned().collect(),
                declared: Vec::new(),
                asserted: Vec::new(),
                marks: Vec::new(),
                queries: Vec::new(),
            }
        }
    }

    impl SmtSolver for ScriptedSolver {
        type Error = UnbalancedPop;

        fn declare_var(&mut self, name: &str, _sort: &SmtSort) -> Result<(), UnbalancedPop> {
            self.declared.push(name.to_string());
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), UnbalancedPop> {
            self.asserted.push(term.clone());
            Ok(())
        }

        fn push(&mut self) -> Result<(), UnbalancedPop> {
            self.marks.push(self.asserted.len());
            Ok(())
        }

        fn pop(&mut self) -> Result<(), UnbalancedPop> {
            let mark = self.marks.pop().ok_or(UnbalancedPop)?;
            self.asserted.truncate(mark);
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, UnbalancedPop> {
            self.queries.push(self.asserted.clone());
            Ok(self.answers.pop().unwrap_or(SatResult::Unknown("script exhausted".into())))
        }

        fn check_sat_with_model(
            &mut self,
            var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), UnbalancedPop> {
            let answer = self.check_sat()?;
            let model = (answer == SatResult::Sat).then(|| Model {
                values: var_names
                    .iter()
                    .map(|(name, _)| (name.to_string(), ModelValue::Int(0)))
                    .collect(),
            });
            Ok((answer, model))
        }

        fn reset(&mut self) -> Result<(), UnbalancedPop> {
            self.declared.clear();
            self.asserted.clear();
            self.marks.clear();
            Ok(())
        }
    }

    #[test]
    fn model_values_are_typed() {
        let mut model = Model::default();
        model.values.insert("x_1".to_string(), ModelValue::Int(-3));
        model.values.insert("p".to_string(), ModelValue::Bool(false));

        assert_eq!(model.get_int("x_1"), Some(-3));
        assert_eq!(model.get_bool("p"), Some(false));
        assert_eq!(model.get_int("p"), None);
        assert_eq!(model.get_bool("x_1"), None);
        assert_eq!(model.get_int("y_1"), None);
    }

    #[test]
    fn scoped_queries_share_the_base_constraints() {
        let base = SmtTerm::var("x_1").eq(SmtTerm::int(1));
        let mut solver = ScriptedSolver::answering(&[SatResult::Unsat, SatResult::Sat]);
        solver.declare_var("x_1", &SmtSort::Int).unwrap();
        solver.assert(&base).unwrap();

        for probe in [SmtTerm::int(2), SmtTerm::int(1)] {
            solver.push().unwrap();
            solver.assert(&SmtTerm::var("x_1").ne(probe)).unwrap();
            solver.check_sat().unwrap();
            solver.pop().unwrap();
        }

        assert_eq!(solver.queries.len(), 2);
        assert!(solver.queries.iter().all(|q| q.len() == 2 && q[0] == base));
        assert_eq!(solver.asserted, vec![base]);
        assert!(solver.pop().is_err());
    }

    #[test]
    fn model_is_only_read_back_when_sat() {
        let mut solver = ScriptedSolver::answering(&[
            SatResult::Sat,
            SatResult::Unknown("timeout".to_string()),
        ]);
        let vars = [("n", &SmtSort::Int)];
        let (answer, model) = solver.check_sat_with_model(&vars).unwrap();
        assert_eq!(answer, SatResult::Sat);
        assert_eq!(model.unwrap().get_int("n"), Some(0));

        let (answer, model) = solver.check_sat_with_model(&vars).unwrap();
        assert_eq!(answer.to_string(), "unknown (timeout)");
        assert!(model.is_none());
    }

    #[test]
    fn reset_forgets_declarations() {
        let mut solver = ScriptedSolver::answering(&[]);
        solver.declare_var("a", &SmtSort::Bool).unwrap();
        solver.push().unwrap();
        solver.reset().unwrap();
        assert!(solver.declared.is_empty());
        assert!(solver.pop().is_err());
        assert!(matches!(solver.check_sat().unwrap(), SatResult::Unknown(_)));
    }
}
