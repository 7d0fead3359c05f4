//! Front end for the minilang language.
//!
//! Source text is parsed with a pest grammar into a loop-bearing [`ast::Program`];
//! [`unroll::unroll`] then replaces every `for`/`while` with a fixed number of
//! guarded copies so later stages only ever see loop-free programs.

pub mod ast;
pub mod errors;
pub mod parser;
pub mod printer;
pub mod unroll;

pub use parser::{parse, parse_tree};
pub use unroll::{unroll, DEFAULT_UNROLL_BOUND};
