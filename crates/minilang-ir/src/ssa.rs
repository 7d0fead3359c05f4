use std::collections::BTreeSet;
use std::fmt;

use minilang_dsl::ast::Expr;

/// A variable as it appears in SSA form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SsaVar {
    /// The `version`-th assignment to `base`, printed `base_version`.
    Versioned { base: String, version: u32 },
    /// A name read before any assignment; stays unconstrained.
    Free(String),
}

impl SsaVar {
    pub fn versioned(base: impl Into<String>, version: u32) -> Self {
        SsaVar::Versioned {
            base: base.into(),
            version,
        }
    }

    pub fn free(name: impl Into<String>) -> Self {
        SsaVar::Free(name.into())
    }

    pub fn base(&self) -> &str {
        match self {
            SsaVar::Versioned { base, .. } => base,
            SsaVar::Free(name) => name,
        }
    }

    pub fn version(&self) -> Option<u32> {
        match self {
            SsaVar::Versioned { version, .. } => Some(*version),
            SsaVar::Free(_) => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, SsaVar::Free(_))
    }

    /// Ordering used by reports: base name, then numeric version, free names first.
    pub fn sort_key(&self) -> (&str, u32) {
        (self.base(), self.version().unwrap_or(0))
    }
}

impl fmt::Display for SsaVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsaVar::Versioned { base, version } => write!(f, "{base}_{version}"),
            SsaVar::Free(name) => write!(f, "{name}"),
        }
    }
}

pub type SsaExpr = Expr<SsaVar>;

/// Right-hand side of a versioned assignment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SsaValue {
    Expr(SsaExpr),
    /// Join of the then-side and else-side definitions; `None` where a side
    /// has no definition at all.
    Phi(Option<SsaVar>, Option<SsaVar>),
}

impl fmt::Display for SsaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn arg(v: &Option<SsaVar>) -> String {
            v.as_ref().map_or_else(|| "None".to_string(), ToString::to_string)
        }
        match self {
            SsaValue::Expr(e) => write!(f, "{e}"),
            SsaValue::Phi(a, b) => write!(f, "phi({}, {})", arg(a), arg(b)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SsaStmt {
    Assign { target: SsaVar, value: SsaValue },
    /// Entry into a conditional region. The next `body_len` statements form
    /// the region; nested branches count toward every enclosing region.
    Branch { condition: SsaExpr, body_len: usize },
    Assert { condition: SsaExpr },
}

/// Flat SSA statement list for one program.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SsaProgram {
    pub statements: Vec<SsaStmt>,
}

/// A statement together with its nesting depth and innermost guard.
#[derive(Debug, Clone, Copy)]
pub struct ScopedStmt<'a> {
    pub stmt: &'a SsaStmt,
    pub depth: usize,
    pub guard: Option<&'a SsaExpr>,
}

impl SsaProgram {
    pub fn new(statements: Vec<SsaStmt>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The last assignment target whose base name is `base`.
    pub fn final_version(&self, base: &str) -> Option<&SsaVar> {
        self.statements.iter().rev().find_map(|stmt| match stmt {
            SsaStmt::Assign { target, .. } if target.base() == base => Some(target),
            _ => None,
        })
    }

    /// Base names that receive at least one assignment, sorted.
    pub fn assigned_bases(&self) -> BTreeSet<&str> {
        self.statements
            .iter()
            .filter_map(|stmt| match stmt {
                SsaStmt::Assign { target, .. } => Some(target.base()),
                _ => None,
            })
            .collect()
    }

    pub fn assertions(&self) -> impl Iterator<Item = &SsaExpr> {
        self.statements.iter().filter_map(|stmt| match stmt {
            SsaStmt::Assert { condition } => Some(condition),
            _ => None,
        })
    }

    /// Walk the statements with region bookkeeping resolved.
    pub fn scoped(&self) -> Vec<ScopedStmt<'_>> {
        let mut open: Vec<(usize, &SsaExpr)> = Vec::new();
        let mut out = Vec::with_capacity(self.statements.len());
        for stmt in &self.statements {
            out.push(ScopedStmt {
                stmt,
                depth: open.len(),
                guard: open.last().map(|(_, cond)| *cond),
            });
            for (remaining, _) in open.iter_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            open.retain(|(remaining, _)| *remaining > 0);
            if let SsaStmt::Branch {
                condition,
                body_len,
            } = stmt
            {
                if *body_len > 0 {
                    open.push((*body_len, condition));
                }
            }
        }
        out
    }
}

impl fmt::Display for SsaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scoped in self.scoped() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            let pad = "  ".repeat(scoped.depth);
            match scoped.stmt {
                SsaStmt::Assign { target, value } => write!(f, "{pad}{target} := {value};")?,
                SsaStmt::Branch { condition, .. } => write!(f, "{pad}if ({condition})")?,
                SsaStmt::Assert { condition } => write!(f, "{pad}assert({condition});")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minilang_dsl::ast::{BinOp, CmpOp};

    fn v(base: &str, version: u32) -> SsaExpr {
        Expr::Var(SsaVar::versioned(base, version))
    }

    fn assign(base: &str, version: u32, value: SsaExpr) -> SsaStmt {
        SsaStmt::Assign {
            target: SsaVar::versioned(base, version),
            value: SsaValue::Expr(value),
        }
    }

    #[test]
    fn var_display_and_ordering_key() {
        let x3 = SsaVar::versioned("x", 3);
        assert_eq!(x3.to_string(), "x_3");
        assert_eq!(SsaVar::free("n").to_string(), "n");
        assert!(SsaVar::free("x").sort_key() < x3.sort_key());
        assert!(SsaVar::versioned("x", 2).sort_key() < SsaVar::versioned("x", 10).sort_key());
    }

    #[test]
    fn listing_indents_branch_bodies() {
        let program = SsaProgram::new(vec![
            assign("x", 1, Expr::int(0)),
            SsaStmt::Branch {
                condition: Expr::compare(CmpOp::Lt, v("x", 1), Expr::int(3)),
                body_len: 1,
            },
            assign("x", 2, Expr::binary(BinOp::Add, v("x", 1), Expr::int(1))),
            SsaStmt::Assert {
                condition: Expr::compare(CmpOp::Ge, v("x", 2), Expr::int(3)),
            },
        ]);
        assert_eq!(
            program.to_string(),
            "x_1 := 0;\nif (x_1 < 3)\n  x_2 := x_1 + 1;\nassert(x_2 >= 3);"
        );
    }

    #[test]
    fn nested_regions_close_together() {
        let program = SsaProgram::new(vec![
            SsaStmt::Branch {
                condition: Expr::compare(CmpOp::Gt, v("a", 1), Expr::int(0)),
                body_len: 3,
            },
            assign("b", 1, Expr::int(1)),
            SsaStmt::Branch {
                condition: Expr::compare(CmpOp::Gt, v("b", 1), Expr::int(0)),
                body_len: 1,
            },
            assign("c", 1, Expr::int(2)),
            assign("d", 1, Expr::int(3)),
        ]);
        let scoped = program.scoped();
        let depths: Vec<usize> = scoped.iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 2, 0]);
        assert_eq!(
            scoped[3].guard.map(ToString::to_string).as_deref(),
            Some("b_1 > 0")
        );
        assert!(scoped[4].guard.is_none());
    }

    #[test]
    fn phi_display_marks_missing_sides() {
        let phi = SsaValue::Phi(Some(SsaVar::versioned("x", 2)), None);
        assert_eq!(phi.to_string(), "phi(x_2, None)");
    }

    #[test]
    fn final_version_and_assigned_bases() {
        let program = SsaProgram::new(vec![
            assign("x", 1, Expr::int(0)),
            assign("y", 1, v("x", 1)),
            assign("x", 2, Expr::int(5)),
            SsaStmt::Assert {
                condition: Expr::compare(CmpOp::Eq, v("x", 2), Expr::int(5)),
            },
        ]);
        assert_eq!(program.final_version("x"), Some(&SsaVar::versioned("x", 2)));
        assert_eq!(program.final_version("y"), Some(&SsaVar::versioned("y", 1)));
        assert_eq!(program.final_version("z"), None);
        assert_eq!(
            program.assigned_bases().into_iter().collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert_eq!(program.assertions().count(), 1);
    }
}
