//! Bounded loop unrolling.
//!
//! `for (init; c; update) { B }` becomes `init` followed by `bound` copies of
//! `if (c) { B; update; }`, and `while (c) { B }` becomes `bound` copies of
//! `if (c) { B }`. Every copy is emitted regardless of whether an earlier
//! guard could already be false, and iterations past `bound` are simply
//! absent, so properties that depend on more iterations are out of reach.

use tracing::debug;

use crate::ast::{Program, Stmt};

/// Default number of guarded copies per loop.
pub const DEFAULT_UNROLL_BOUND: usize = 3;

/// Replace every loop in `program` with `bound` guarded copies of its body.
///
/// Loop-free input comes back unchanged, so `unroll(&unroll(p, k), k) == unroll(p, k)`.
pub fn unroll(program: &Program, bound: usize) -> Program {
    let statements = unroll_block(&program.statements, bound);
    debug!(
        bound,
        before = program.statements.len(),
        after = statements.len(),
        "unrolled program"
    );
    Program { statements }
}

fn unroll_block(stmts: &[Stmt], bound: usize) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        unroll_stmt(stmt, bound, &mut out);
    }
    out
}

fn unroll_stmt(stmt: &Stmt, bound: usize, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::Assign { .. } | Stmt::Assert { .. } => out.push(stmt.clone()),
        Stmt::If {
            condition,
            then_block,
            else_block,
            span,
        } => out.push(Stmt::If {
            condition: condition.clone(),
            then_block: unroll_block(then_block, bound),
            else_block: else_block.as_ref().map(|b| unroll_block(b, bound)),
            span: *span,
        }),
        Stmt::For {
            init,
            condition,
            update,
            body,
            span,
        } => {
            unroll_stmt(init, bound, out);
            let mut guarded = unroll_block(body, bound);
            unroll_stmt(update, bound, &mut guarded);
            for _ in 0..bound {
                out.push(Stmt::If {
                    condition: condition.clone(),
                    then_block: guarded.clone(),
                    else_block: None,
                    span: *span,
                });
            }
        }
        Stmt::While {
            condition,
            body,
            span,
        } => {
            let guarded = unroll_block(body, bound);
            for _ in 0..bound {
                out.push(Stmt::If {
                    condition: condition.clone(),
                    then_block: guarded.clone(),
                    else_block: None,
                    span: *span,
                });
            }
        }
    }
}
