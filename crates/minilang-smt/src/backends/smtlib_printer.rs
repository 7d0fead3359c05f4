use std::fmt::Write;

use minilang_dsl::ast::{BinOp, CmpOp};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

fn arith_head(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "div",
    }
}

fn compare_head(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "<",
        CmpOp::Gt => ">",
        CmpOp::Le => "<=",
        CmpOp::Ge => ">=",
        CmpOp::Eq | CmpOp::Ne => "=",
    }
}

/// Quoted form of a symbol name.
///
/// Source identifiers such as `true`, `div` or `let` are valid program
/// variables, so every symbol is written between bars.
pub fn symbol_to_smtlib(name: &str) -> String {
    format!("|{name}|")
}

/// Render a term as an SMT-LIB2 s-expression.
pub fn to_smtlib(term: &SmtTerm) -> String {
    let mut out = String::new();
    write_term(&mut out, term);
    out
}

fn application(out: &mut String, head: &str, args: &[&SmtTerm]) {
    out.push('(');
    out.push_str(head);
    for arg in args {
        out.push(' ');
        write_term(out, arg);
    }
    out.push(')');
}

fn write_term(out: &mut String, term: &SmtTerm) {
    match term {
        SmtTerm::Var(name) => {
            out.push('|');
            out.push_str(name);
            out.push('|');
        }
        // SMT-LIB numerals are unsigned.
        SmtTerm::Int(n) if *n < 0 => {
            let _ = write!(out, "(- {})", n.unsigned_abs());
        }
        SmtTerm::Int(n) => {
            let _ = write!(out, "{n}");
        }
        SmtTerm::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        SmtTerm::Arith(op, l, r) => application(out, arith_head(*op), &[&**l, &**r]),
        SmtTerm::Compare(CmpOp::Ne, l, r) => {
            out.push_str("(not ");
            application(out, "=", &[&**l, &**r]);
            out.push(')');
        }
        SmtTerm::Compare(op, l, r) => application(out, compare_head(*op), &[&**l, &**r]),
        SmtTerm::And(terms) | SmtTerm::Or(terms) if terms.len() <= 1 => match terms.first() {
            Some(only) => write_term(out, only),
            None => out.push_str(if matches!(term, SmtTerm::And(_)) { "true" } else { "false" }),
        },
        SmtTerm::And(terms) => application(out, "and", &terms.iter().collect::<Vec<_>>()),
        SmtTerm::Or(terms) => application(out, "or", &terms.iter().collect::<Vec<_>>()),
        SmtTerm::Not(inner) => application(out, "not", &[&**inner]),
        SmtTerm::Implies(l, r) => application(out, "=>", &[&**l, &**r]),
    }
}

/// SMT-LIB2 name of a sort.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
    }
}
