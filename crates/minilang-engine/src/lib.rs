//! Minilang analysis engine.
//!
//! Drives the full pipeline (parse, unroll, SSA conversion, constraint
//! encoding, solving) and renders the two analyses: assertion checking for
//! one program and equivalence checking for a pair.

pub mod pipeline;
pub mod result;
