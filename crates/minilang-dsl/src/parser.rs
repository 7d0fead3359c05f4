#![allow(clippy::result_large_err)]

use pest::Parser;
use pest_derive::Parser;
use tracing::debug;

use crate::ast::*;
use crate::errors::ParseError;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct MiniLangParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

fn span_from(pair: &Pair<'_>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

/// Source text and filename carried through AST building so every error
/// can render a labelled snippet.
struct Builder<'s> {
    source: &'s str,
    filename: &'s str,
}

/// Parse minilang source into an AST [`Program`]. Loops are kept as-is;
/// run [`crate::unroll::unroll`] before SSA conversion.
pub fn parse(source: &str, filename: &str) -> Result<Program, ParseError> {
    let builder = Builder { source, filename };
    let program_pair = builder.parse_program()?;

    let mut statements = Vec::new();
    for pair in program_pair.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        statements.push(builder.statement(pair)?);
    }
    debug!(filename, statements = statements.len(), "parsed program");
    Ok(Program { statements })
}

/// Render the raw pest parse tree as indented text, one rule per line.
/// Leaf rules show the text they matched.
pub fn parse_tree(source: &str, filename: &str) -> Result<String, ParseError> {
    let builder = Builder { source, filename };
    let program_pair = builder.parse_program()?;
    let mut lines = Vec::new();
    render_pair(&program_pair, 0, &mut lines);
    Ok(lines.join("\n"))
}

fn render_pair(pair: &Pair<'_>, depth: usize, lines: &mut Vec<String>) {
    if pair.as_rule() == Rule::EOI {
        return;
    }
    let indent = "  ".repeat(depth);
    let children: Vec<Pair<'_>> = pair.clone().into_inner().collect();
    if children.is_empty() {
        lines.push(format!("{indent}{:?} {:?}", pair.as_rule(), pair.as_str()));
    } else {
        lines.push(format!("{indent}{:?}", pair.as_rule()));
        for child in &children {
            render_pair(child, depth + 1, lines);
        }
    }
}

impl<'s> Builder<'s> {
    fn parse_program(&self) -> Result<Pair<'s>, ParseError> {
        let mut pairs = MiniLangParser::parse(Rule::program, self.source).map_err(|e| {
            let (start, end) = match e.location {
                pest::error::InputLocation::Pos(p) => (p, (p + 1).min(self.source.len())),
                pest::error::InputLocation::Span((s, e)) => (s, e),
            };
            let (line, col) = match e.line_col {
                pest::error::LineColLocation::Pos(lc) => lc,
                pest::error::LineColLocation::Span(lc, _) => lc,
            };
            let message = format!("line {line}, column {col}: {}", e.variant.message());
            ParseError::syntax(message, Span::new(start, end), self.source, self.filename)
        })?;
        pairs.next().ok_or_else(|| {
            ParseError::syntax(
                "empty parse result",
                Span::new(0, 0),
                self.source,
                self.filename,
            )
        })
    }

    fn error_at(&self, pair: &Pair<'_>, message: impl Into<String>) -> ParseError {
        ParseError::syntax(message, span_from(pair), self.source, self.filename)
    }

    fn child<'a>(
        &self,
        inner: &mut Pairs<'a>,
        parent: Span,
        what: &str,
    ) -> Result<Pair<'a>, ParseError> {
        inner.next().ok_or_else(|| {
            ParseError::syntax(
                format!("missing {what}"),
                parent,
                self.source,
                self.filename,
            )
        })
    }

    fn statement(&self, pair: Pair<'_>) -> Result<Stmt, ParseError> {
        let span = span_from(&pair);
        match pair.as_rule() {
            Rule::assignment | Rule::for_assign => {
                let mut inner = pair.into_inner();
                let target = self.child(&mut inner, span, "assignment target")?;
                let value = self.expr(self.child(&mut inner, span, "assigned expression")?)?;
                Ok(Stmt::Assign {
                    target: target.as_str().to_string(),
                    value,
                    span,
                })
            }
            Rule::if_stmt => {
                let mut inner = pair.into_inner();
                let condition = self.condition(self.child(&mut inner, span, "if condition")?)?;
                let then_block = self.block(self.child(&mut inner, span, "then block")?)?;
                let else_block = match inner.next() {
                    Some(else_pair) => {
                        let else_span = span_from(&else_pair);
                        let mut else_inner = else_pair.into_inner();
                        Some(self.block(self.child(&mut else_inner, else_span, "else block")?)?)
                    }
                    None => None,
                };
                Ok(Stmt::If {
                    condition,
                    then_block,
                    else_block,
                    span,
                })
            }
            Rule::for_stmt => {
                let mut inner = pair.into_inner();
                let init = self.statement(self.child(&mut inner, span, "for initializer")?)?;
                let condition = self.condition(self.child(&mut inner, span, "for condition")?)?;
                let update = self.statement(self.child(&mut inner, span, "for update")?)?;
                let body = self.block(self.child(&mut inner, span, "for body")?)?;
                Ok(Stmt::For {
                    init: Box::new(init),
                    condition,
                    update: Box::new(update),
                    body,
                    span,
                })
            }
            Rule::while_stmt => {
                let mut inner = pair.into_inner();
                let condition = self.condition(self.child(&mut inner, span, "while condition")?)?;
                let body = self.block(self.child(&mut inner, span, "while body")?)?;
                Ok(Stmt::While {
                    condition,
                    body,
                    span,
                })
            }
            Rule::assert_stmt => {
                let mut inner = pair.into_inner();
                let condition = self.condition(self.child(&mut inner, span, "assert condition")?)?;
                Ok(Stmt::Assert { condition, span })
            }
            other => Err(self.error_at(&pair, format!("unexpected statement rule {other:?}"))),
        }
    }

    fn block(&self, pair: Pair<'_>) -> Result<Vec<Stmt>, ParseError> {
        pair.into_inner().map(|p| self.statement(p)).collect()
    }

    fn condition(&self, pair: Pair<'_>) -> Result<Expr, ParseError> {
        let span = span_from(&pair);
        let mut inner = pair.into_inner();
        let lhs = self.expr(self.child(&mut inner, span, "left operand")?)?;
        let op_pair = self.child(&mut inner, span, "comparison operator")?;
        let op = CmpOp::parse(op_pair.as_str()).ok_or_else(|| {
            self.error_at(
                &op_pair,
                format!("unknown comparison operator '{}'", op_pair.as_str()),
            )
        })?;
        let rhs = self.expr(self.child(&mut inner, span, "right operand")?)?;
        Ok(Expr::compare(op, lhs, rhs))
    }

    fn expr(&self, pair: Pair<'_>) -> Result<Expr, ParseError> {
        match pair.as_rule() {
            Rule::expr | Rule::term => {
                let span = span_from(&pair);
                let mut inner = pair.into_inner();
                let mut result = self.expr(self.child(&mut inner, span, "operand")?)?;
                while let Some(op_pair) = inner.next() {
                    let rhs = self.expr(self.child(&mut inner, span, "right operand")?)?;
                    let op = match op_pair.as_str() {
                        "+" => BinOp::Add,
                        "-" => BinOp::Sub,
                        "*" => BinOp::Mul,
                        "/" => BinOp::Div,
                        other => {
                            return Err(
                                self.error_at(&op_pair, format!("unknown operator '{other}'"))
                            )
                        }
                    };
                    result = Expr::binary(op, result, rhs);
                }
                Ok(result)
            }
            Rule::number => {
                let text = pair.as_str();
                text.parse::<i64>().map(Expr::Int).map_err(|_| {
                    ParseError::integer_out_of_range(
                        text,
                        span_from(&pair),
                        self.source,
                        self.filename,
                    )
                })
            }
            Rule::ident => Ok(Expr::Var(pair.as_str().to_string())),
            Rule::condition => self.condition(pair),
            other => Err(self.error_at(&pair, format!("unexpected expression rule {other:?}"))),
        }
    }
}
