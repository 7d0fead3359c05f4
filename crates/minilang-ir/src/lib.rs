//! SSA intermediate form for loop-free minilang programs.
//!
//! [`convert_to_ssa`] walks an unrolled [`minilang_dsl::ast::Program`] once,
//! issuing a fresh version `base_n` for every assignment and renaming every
//! read to the version currently in scope. How versions are reconciled after
//! an `if` is delegated to a [`MergePolicy`].

pub mod convert;
pub mod merge;
pub mod ssa;

pub use convert::{convert_to_ssa, convert_to_ssa_with, SsaConverter, SsaError, VersionTable};
pub use merge::MergePolicy;
pub use ssa::{ScopedStmt, SsaExpr, SsaProgram, SsaStmt, SsaValue, SsaVar};
