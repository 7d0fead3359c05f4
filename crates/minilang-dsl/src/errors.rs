#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(minilang::parse::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Integer literal out of range: {literal}")]
    #[diagnostic(
        code(minilang::parse::integer_range),
        help("literals must fit in a signed 64-bit integer")
    )]
    IntegerOutOfRange {
        literal: String,
        #[label("too large")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

fn located(
    span: Span,
    source: &str,
    filename: &str,
) -> (miette::SourceSpan, miette::NamedSource<String>) {
    (
        (span.start, span.end.saturating_sub(span.start)).into(),
        miette::NamedSource::new(filename, source.to_owned()),
    )
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, span: Span, source: &str, filename: &str) -> Self {
        let (span, src) = located(span, source, filename);
        ParseError::Syntax {
            message: message.into(),
            span,
            src,
        }
    }

    pub fn integer_out_of_range(
        literal: impl Into<String>,
        span: Span,
        source: &str,
        filename: &str,
    ) -> Self {
        let (span, src) = located(span, source, filename);
        ParseError::IntegerOutOfRange {
            literal: literal.into(),
            span,
            src,
        }
    }

    /// Byte offset of the offending input.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::Syntax { span, .. } | ParseError::IntegerOutOfRange { span, .. } => {
                span.offset()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_points_at_offending_token() {
        let source = "x := ;";
        let err = ParseError::syntax("expected expression", Span::new(5, 6), source, "bad.ml");
        assert_eq!(err.to_string(), "Syntax error: expected expression");
        let ParseError::Syntax { span, src, .. } = &err else {
            panic!("expected a syntax error, got {err:?}");
        };
        assert_eq!((span.offset(), span.len()), (5, 1));
        assert_eq!(src.name(), "bad.ml");
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn empty_span_at_end_of_input() {
        let err =
            ParseError::syntax("unexpected end of input", Span::new(8, 8), "x := 1 +", "eof.ml");
        let ParseError::Syntax { span, .. } = &err else {
            panic!("expected a syntax error");
        };
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn integer_range_error_names_the_literal() {
        let err = ParseError::integer_out_of_range(
            "99999999999999999999",
            Span::new(5, 25),
            "x := 99999999999999999999;",
            "big.ml",
        );
        assert_eq!(
            err.to_string(),
            "Integer literal out of range: 99999999999999999999"
        );
        assert_eq!(err.offset(), 5);
    }
}
