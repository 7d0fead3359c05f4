//! Reconciliation of version tables at the end of an `if`.
//!
//! [`MergePolicy::LastBranchWins`] keeps one shared table for both branches:
//! the else block reads the then block's versions, and code after the `if`
//! sees whichever branch was processed last. This is not textbook SSA and
//! downstream encoding is defined against it.
//!
//! [`MergePolicy::PhiAtJoin`] gives each branch the pre-branch table and emits
//! `x_n := phi(then_def, else_def)` for every variable either side assigned.

use std::collections::BTreeMap;

use crate::convert::VersionTable;
use crate::ssa::{SsaStmt, SsaValue, SsaVar};

pub(crate) type Bindings = BTreeMap<String, SsaVar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum MergePolicy {
    #[default]
    LastBranchWins,
    PhiAtJoin,
}

/// Version bindings observed around one `if`.
pub(crate) struct JoinPoint<'a> {
    pub before: &'a Bindings,
    pub then_end: &'a Bindings,
    pub else_end: Option<&'a Bindings>,
}

impl MergePolicy {
    pub fn name(self) -> &'static str {
        match self {
            MergePolicy::LastBranchWins => "last-branch-wins",
            MergePolicy::PhiAtJoin => "phi",
        }
    }

    /// Called between the then block and the else block.
    pub(crate) fn enter_else(self, table: &mut VersionTable, before: &Bindings) {
        match self {
            MergePolicy::LastBranchWins => {}
            MergePolicy::PhiAtJoin => table.restore(before.clone()),
        }
    }

    /// Called after both blocks; returns statements to append at the join.
    pub(crate) fn join(self, table: &mut VersionTable, point: JoinPoint<'_>) -> Vec<SsaStmt> {
        match self {
            MergePolicy::LastBranchWins => Vec::new(),
            MergePolicy::PhiAtJoin => phi_at_join(table, point),
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "last-branch-wins" | "last" => Ok(MergePolicy::LastBranchWins),
            "phi" | "phi-at-join" => Ok(MergePolicy::PhiAtJoin),
            other => Err(format!(
                "unknown merge policy '{other}'; use 'last-branch-wins' or 'phi'"
            )),
        }
    }
}

fn phi_at_join(table: &mut VersionTable, point: JoinPoint<'_>) -> Vec<SsaStmt> {
    let else_end = point.else_end.unwrap_or(point.before);
    let mut changed: Vec<&str> = point
        .then_end
        .iter()
        .chain(else_end.iter())
        .filter(|(base, var)| point.before.get(*base) != Some(*var))
        .map(|(base, _)| base.as_str())
        .collect();
    changed.sort_unstable();
    changed.dedup();

    let mut out = Vec::with_capacity(changed.len());
    for base in changed {
        let then_arg = point.then_end.get(base).cloned();
        let else_arg = else_end.get(base).cloned();
        let target = table.issue(base);
        out.push(SsaStmt::Assign {
            target,
            value: SsaValue::Phi(then_arg, else_arg),
        });
    }
    out
}
