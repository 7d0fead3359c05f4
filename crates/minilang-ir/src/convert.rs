use std::collections::HashMap;

use minilang_dsl::ast::{Expr, Program, Span, Stmt};
use thiserror::Error;
use tracing::{debug, trace};

use crate::merge::{Bindings, JoinPoint, MergePolicy};
use crate::ssa::{SsaExpr, SsaProgram, SsaStmt, SsaValue, SsaVar};

#[derive(Debug, Error, PartialEq)]
pub enum SsaError {
    #[error("loop at bytes {}..{} reached SSA conversion; unroll the program first", .span.start, .span.end)]
    LoopNotUnrolled { span: Span },
}

/// Per-conversion version state: the highest version issued per base name
/// and the version currently in scope.
#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    counter: HashMap<String, u32>,
    current: Bindings,
}

impl VersionTable {
    /// Issue the next version of `base` and make it current.
    pub fn issue(&mut self, base: &str) -> SsaVar {
        let n = self.counter.entry(base.to_string()).or_insert(0);
        *n += 1;
        let var = SsaVar::versioned(base, *n);
        self.current.insert(base.to_string(), var.clone());
        var
    }

    pub fn lookup(&self, base: &str) -> Option<&SsaVar> {
        self.current.get(base)
    }

    /// Current version of `base`, or the bare name if it was never assigned.
    pub fn current(&self, base: &str) -> SsaVar {
        self.lookup(base)
            .cloned()
            .unwrap_or_else(|| SsaVar::free(base))
    }

    pub fn rename(&self, expr: &Expr) -> SsaExpr {
        expr.map_vars(&mut |name: &String| self.current(name))
    }

    pub(crate) fn bindings(&self) -> &Bindings {
        &self.current
    }

    pub(crate) fn restore(&mut self, bindings: Bindings) {
        self.current = bindings;
    }
}

/// Single-pass converter from an unrolled program to [`SsaProgram`].
#[derive(Debug, Default)]
pub struct SsaConverter {
    table: VersionTable,
    policy: MergePolicy,
    out: Vec<SsaStmt>,
}

impl SsaConverter {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            table: VersionTable::default(),
            policy,
            out: Vec::new(),
        }
    }

    pub fn convert(mut self, program: &Program) -> Result<SsaProgram, SsaError> {
        for stmt in &program.statements {
            match stmt {
                Stmt::Assign { target, value, .. } => self.assign(target, value),
                Stmt::If {
                    condition,
                    then_block,
                    else_block,
                    ..
                } => self.branch(condition, then_block, else_block.as_deref())?,
                Stmt::Assert { condition, .. } => {
                    let condition = self.table.rename(condition);
                    self.out.push(SsaStmt::Assert { condition });
                }
                Stmt::For { span, .. } | Stmt::While { span, .. } => {
                    return Err(SsaError::LoopNotUnrolled { span: *span });
                }
            }
        }
        debug!(
            statements = self.out.len(),
            policy = %self.policy,
            "converted program to SSA"
        );
        Ok(SsaProgram::new(self.out))
    }

    fn assign(&mut self, target: &str, value: &Expr) {
        // Reads resolve before the target gets its new version.
        let value = self.table.rename(value);
        let target = self.table.issue(target);
        self.out.push(SsaStmt::Assign {
            target,
            value: SsaValue::Expr(value),
        });
    }

    fn branch(
        &mut self,
        condition: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
    ) -> Result<(), SsaError> {
        let condition = self.table.rename(condition);
        let marker = self.out.len();
        self.out.push(SsaStmt::Branch {
            condition,
            body_len: 0,
        });

        let before = self.table.bindings().clone();
        self.branch_body(then_block)?;
        let then_end = self.table.bindings().clone();

        let else_end = match else_block {
            Some(block) => {
                self.policy.enter_else(&mut self.table, &before);
                self.branch_body(block)?;
                Some(self.table.bindings().clone())
            }
            None => None,
        };

        let body_len = self.out.len() - marker - 1;
        if let Some(SsaStmt::Branch { body_len: len, .. }) = self.out.get_mut(marker) {
            *len = body_len;
        }

        let joined = self.policy.join(
            &mut self.table,
            JoinPoint {
                before: &before,
                then_end: &then_end,
                else_end: else_end.as_ref(),
            },
        );
        self.out.extend(joined);
        Ok(())
    }

    /// Only top-level assignments inside a branch body are converted;
    /// nested conditionals and assertions there are skipped.
    fn branch_body(&mut self, block: &[Stmt]) -> Result<(), SsaError> {
        for stmt in block {
            match stmt {
                Stmt::Assign { target, value, .. } => self.assign(target, value),
                Stmt::If { span, .. } | Stmt::Assert { span, .. } => {
                    trace!(start = span.start, "skipping nested statement in branch body");
                }
                Stmt::For { span, .. } | Stmt::While { span, .. } => {
                    return Err(SsaError::LoopNotUnrolled { span: *span });
                }
            }
        }
        Ok(())
    }
}

/// Convert with the default [`MergePolicy::LastBranchWins`].
pub fn convert_to_ssa(program: &Program) -> Result<SsaProgram, SsaError> {
    convert_to_ssa_with(program, MergePolicy::default())
}

pub fn convert_to_ssa_with(program: &Program, policy: MergePolicy) -> Result<SsaProgram, SsaError> {
    SsaConverter::new(policy).convert(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minilang_dsl::{parse, unroll};

    fn ssa_of(src: &str) -> SsaProgram {
        let program = parse(src, "ssa.ml").expect("parses");
        convert_to_ssa(&unroll(&program, 3)).expect("converts")
    }

    fn ssa_lines(src: &str) -> Vec<String> {
        ssa_of(src).to_string().lines().map(str::to_string).collect()
    }

    #[test]
    fn straight_line_versions_increase() {
        let lines = ssa_lines("x := 1; y := x + 2; x := x * y;");
        assert_eq!(lines, vec!["x_1 := 1;", "y_1 := x_1 + 2;", "x_2 := x_1 * y_1;"]);
    }

    #[test]
    fn read_before_write_stays_bare() {
        let lines = ssa_lines("y := n + 1; n := y;");
        assert_eq!(lines, vec!["y_1 := n + 1;", "n_1 := y_1;"]);
    }

    #[test]
    fn self_reference_reads_previous_version() {
        let lines = ssa_lines("x := 0; x := x + 1;");
        assert_eq!(lines[1], "x_2 := x_1 + 1;");
    }

    #[test]
    fn for_loop_unrolled_three_times() {
        let listing = ssa_of(
            "x := 0; for (i := 0; i < 3; i := i + 1) { x := x + 1; } assert(x >= 3);",
        )
        .to_string();
        let wanted = [
            "x_1 := 0",
            "x_2 := x_1 + 1",
            "x_3 := x_2 + 1",
            "x_4 := x_3 + 1",
            "assert(x_4 >= 3)",
        ];
        let mut from = 0;
        for needle in wanted {
            let at = listing[from..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing `{needle}` in order:\n{listing}"));
            from += at + needle.len();
        }
        assert!(listing.contains("if (i_3 < 3)\n  x_4 := x_3 + 1;\n  i_4 := i_3 + 1;"));
    }

    #[test]
    fn branch_marker_records_body_length() {
        let program = ssa_of("x := 1; if (x > 0) { y := 1; z := 2; } else { y := 3; }");
        match &program.statements[1] {
            SsaStmt::Branch { body_len, .. } => assert_eq!(*body_len, 3),
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn last_processed_branch_wins_after_if() {
        let lines = ssa_lines(
            "x := 0; if (x > 0) { x := 1; } else { x := 2; } y := x;",
        );
        assert_eq!(
            lines,
            vec![
                "x_1 := 0;",
                "if (x_1 > 0)",
                "  x_2 := 1;",
                "  x_3 := 2;",
                "y_1 := x_3;",
            ]
        );
    }

    #[test]
    fn else_block_sees_then_block_versions() {
        // The shared table is not reset between branches.
        let lines = ssa_lines("x := 0; if (x > 0) { x := 5; } else { y := x; }");
        assert_eq!(lines[3], "  y_1 := x_2;");
    }

    #[test]
    fn nested_if_and_assert_in_branch_are_skipped() {
        let lines = ssa_lines(
            "x := 10; y := 5; if (x > y) { z := x + y; assert(z > x); if (z > 0) { w := 1; } } \
             y := z - 2; assert(y >= 0);",
        );
        assert_eq!(
            lines,
            vec![
                "x_1 := 10;",
                "y_1 := 5;",
                "if (x_1 > y_1)",
                "  z_1 := x_1 + y_1;",
                "y_2 := z_1 - 2;",
                "assert(y_2 >= 0);",
            ]
        );
    }

    #[test]
    fn phi_policy_restores_table_and_joins() {
        let program = parse(
            "x := 0; if (x > 0) { x := 1; } else { y := x; } z := x;",
            "phi.ml",
        )
        .expect("parses");
        let ssa = convert_to_ssa_with(&program, MergePolicy::PhiAtJoin).expect("converts");
        let lines: Vec<String> = ssa.to_string().lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "x_1 := 0;",
                "if (x_1 > 0)",
                "  x_2 := 1;",
                "  y_1 := x_1;",
                "x_3 := phi(x_2, x_1);",
                "y_2 := phi(None, y_1);",
                "z_1 := x_3;",
            ]
        );
    }

    #[test]
    fn loops_are_rejected() {
        let program = parse("while (x > 0) { x := x - 1; }", "loop.ml").expect("parses");
        let err = convert_to_ssa(&program).expect_err("loop must be unrolled first");
        assert!(matches!(err, SsaError::LoopNotUnrolled { .. }));

        let nested = parse("if (x > 0) { for (i := 0; i < 2; i := i + 1) { x := i; } }", "n.ml")
            .expect("parses");
        assert!(convert_to_ssa(&nested).is_err());
    }

    #[test]
    fn independent_conversions_do_not_share_versions() {
        let a = ssa_of("x := 1; x := 2;");
        let b = ssa_of("x := 3;");
        assert_eq!(b.final_version("x"), Some(&SsaVar::versioned("x", 1)));
        assert_eq!(a.final_version("x"), Some(&SsaVar::versioned("x", 2)));
    }
}
