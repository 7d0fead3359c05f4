//! Text renderings of the AST: a tuple-like structural dump and a source
//! re-printer for unrolled programs.

use std::fmt::Write;

use crate::ast::{Expr, Program, Stmt};

/// Render a program as a nested tuple-like structure:
/// `[('assign', 'x', 0), ('if', ('cond', '<', ('var', 'i'), 3), [...], None)]`.
pub fn ast_to_string(program: &Program) -> String {
    block_to_string(&program.statements)
}

pub fn stmt_to_string(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Assign { target, value, .. } => {
            format!("('assign', '{target}', {})", expr_to_string(value))
        }
        Stmt::If {
            condition,
            then_block,
            else_block,
            ..
        } => {
            let else_text = match else_block {
                Some(block) => block_to_string(block),
                None => "None".to_string(),
            };
            format!(
                "('if', {}, {}, {else_text})",
                expr_to_string(condition),
                block_to_string(then_block)
            )
        }
        Stmt::Assert { condition, .. } => format!("('assert', {})", expr_to_string(condition)),
        Stmt::For {
            init,
            condition,
            update,
            body,
            ..
        } => format!(
            "('for', {}, {}, {}, {})",
            stmt_to_string(init),
            expr_to_string(condition),
            stmt_to_string(update),
            block_to_string(body)
        ),
        Stmt::While {
            condition, body, ..
        } => format!(
            "('while', {}, {})",
            expr_to_string(condition),
            block_to_string(body)
        ),
    }
}

fn block_to_string(stmts: &[Stmt]) -> String {
    let items: Vec<String> = stmts.iter().map(stmt_to_string).collect();
    format!("[{}]", items.join(", "))
}

pub fn expr_to_string(expr: &Expr) -> String {
    match expr {
        Expr::Int(n) => n.to_string(),
        Expr::Var(name) => format!("('var', '{name}')"),
        Expr::Binary { op, lhs, rhs } => format!(
            "('{}', {}, {})",
            op.name(),
            expr_to_string(lhs),
            expr_to_string(rhs)
        ),
        Expr::Compare { op, lhs, rhs } => format!(
            "('cond', '{op}', {}, {})",
            expr_to_string(lhs),
            expr_to_string(rhs)
        ),
    }
}

/// Re-print a program as minilang source with four-space indentation.
pub fn format_program(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        format_stmt(stmt, 0, &mut out);
    }
    out
}

fn format_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    let pad = "    ".repeat(depth);
    // Writing into a String cannot fail.
    let _ = match stmt {
        Stmt::Assign { target, value, .. } => writeln!(out, "{pad}{target} := {value};"),
        Stmt::Assert { condition, .. } => writeln!(out, "{pad}assert({condition});"),
        Stmt::If {
            condition,
            then_block,
            else_block,
            ..
        } => {
            let _ = writeln!(out, "{pad}if ({condition}) {{");
            for s in then_block {
                format_stmt(s, depth + 1, out);
            }
            if let Some(block) = else_block {
                let _ = writeln!(out, "{pad}}} else {{");
                for s in block {
                    format_stmt(s, depth + 1, out);
                }
            }
            writeln!(out, "{pad}}}")
        }
        Stmt::For {
            init,
            condition,
            update,
            body,
            ..
        } => {
            let _ = writeln!(
                out,
                "{pad}for ({}; {condition}; {}) {{",
                inline_assign(init),
                inline_assign(update)
            );
            for s in body {
                format_stmt(s, depth + 1, out);
            }
            writeln!(out, "{pad}}}")
        }
        Stmt::While {
            condition, body, ..
        } => {
            let _ = writeln!(out, "{pad}while ({condition}) {{");
            for s in body {
                format_stmt(s, depth + 1, out);
            }
            writeln!(out, "{pad}}}")
        }
    };
}

fn inline_assign(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Assign { target, value, .. } => format!("{target} := {value}"),
        other => stmt_to_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn ast_dump_uses_tuple_shapes() {
        let program = parse("x := 0; if (x < 3) { x := x + 1; } assert(x >= 3);", "t.ml")
            .expect("parses");
        assert_eq!(
            ast_to_string(&program),
            "[('assign', 'x', 0), \
             ('if', ('cond', '<', ('var', 'x'), 3), [('assign', 'x', ('add', ('var', 'x'), 1))], None), \
             ('assert', ('cond', '>=', ('var', 'x'), 3))]"
        );
    }

    #[test]
    fn ast_dump_shows_loops_before_unrolling() {
        let program = parse("while (n > 0) { n := n - 1; }", "t.ml").expect("parses");
        assert_eq!(
            ast_to_string(&program),
            "[('while', ('cond', '>', ('var', 'n'), 0), [('assign', 'n', ('sub', ('var', 'n'), 1))])]"
        );
    }

    #[test]
    fn format_program_reparses_to_the_same_ast() {
        let src = "x := 0;\nfor (i := 0; i < 3; i := i + 1) { if (x > 1) { x := x * 2; } else { x := (x + 1) / 2; } }\nassert(x >= 0);";
        let program = parse(src, "t.ml").expect("parses");
        let printed = format_program(&program);
        let reparsed = parse(&printed, "printed.ml").expect("printed source parses");
        assert_eq!(ast_to_string(&program), ast_to_string(&reparsed));
        assert!(printed.contains("for (i := 0; i < 3; i := i + 1) {"));
        assert!(printed.contains("        x := (x + 1) / 2;"));
    }
}
