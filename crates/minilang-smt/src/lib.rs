//! Constraint encoding and solver integration for minilang SSA programs.
//!
//! [`encoder::encode`] turns an [`minilang_ir::SsaProgram`] into quantifier-free
//! integer formulas guarded by a path condition. Formulas are solver-agnostic
//! [`terms::SmtTerm`]s; any [`solver::SmtSolver`] backend can check them:
//! an SMT-LIB2 subprocess (z3 or cvc5), the in-memory [`backends::bounded`]
//! search, or native Z3 bindings behind the `z3` feature.

pub mod backends;
pub mod encoder;
pub mod solver;
pub mod sorts;
pub mod terms;

pub use encoder::{encode, encode_with_namespace, Encoding, EncodingError, Satisfiability, Valuation};
pub use solver::{Model, ModelValue, SatResult, SmtSolver};
