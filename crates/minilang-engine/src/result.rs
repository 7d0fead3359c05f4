use serde::Serialize;
use std::fmt;

use minilang_smt::Valuation;

/// Outcome of checking one program's assertions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VerificationResult {
    /// All constraints, assertions included, hold together under `model`.
    AssertionsHold { model: Valuation },
    /// The constraints are unsatisfiable.
    Violation,
    /// The solver gave up.
    Unknown { reason: String },
}

impl VerificationResult {
    pub fn verdict_class(&self) -> &'static str {
        match self {
            VerificationResult::AssertionsHold { .. } => "assertions_hold",
            VerificationResult::Violation => "violation",
            VerificationResult::Unknown { .. } => "unknown",
        }
    }

    pub fn holds(&self) -> bool {
        matches!(self, VerificationResult::AssertionsHold { .. })
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::AssertionsHold { model } => {
                write!(f, "All assertions hold")?;
                if !model.is_empty() {
                    write!(f, "\n{model}")?;
                }
                Ok(())
            }
            VerificationResult::Violation => write!(f, "Assertion violation found"),
            VerificationResult::Unknown { reason } => {
                write!(f, "Solver returned unknown: {reason}")
            }
        }
    }
}

/// Model values behind a non-equivalence verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Witness {
    /// Free (never assigned) names shared by both programs.
    pub inputs: Valuation,
    pub program1: Valuation,
    pub program2: Valuation,
}

/// One program's side of a diverging assertion pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionSide {
    pub assertion: String,
    /// Innermost branch condition, or `always` at top level.
    pub guard: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum EquivalenceResult {
    Equivalent,
    /// Final values of `variable` can differ.
    ValueDivergence { variable: String, witness: Witness },
    /// The `index`-th assertions (0-based) can disagree.
    AssertionDivergence {
        index: usize,
        program1: AssertionSide,
        program2: AssertionSide,
        witness: Witness,
    },
    /// The programs assign no base name in common.
    NoCommonVariables,
    /// Encoding or solving failed; the check is inconclusive.
    Error { message: String },
}

impl EquivalenceResult {
    pub fn verdict_class(&self) -> &'static str {
        match self {
            EquivalenceResult::Equivalent => "equivalent",
            EquivalenceResult::ValueDivergence { .. } => "value_divergence",
            EquivalenceResult::AssertionDivergence { .. } => "assertion_divergence",
            EquivalenceResult::NoCommonVariables => "no_common_variables",
            EquivalenceResult::Error { .. } => "error",
        }
    }

    pub fn is_equivalent(&self) -> bool {
        matches!(self, EquivalenceResult::Equivalent)
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            EquivalenceResult::ValueDivergence { witness, .. }
            | EquivalenceResult::AssertionDivergence { witness, .. } => Some(witness),
            _ => None,
        }
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &Valuation) -> fmt::Result {
    if values.is_empty() {
        write!(f, "(none)")
    } else {
        write!(f, "{values}")
    }
}

impl fmt::Display for EquivalenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquivalenceResult::Equivalent => write!(f, "Programs are equivalent"),
            EquivalenceResult::ValueDivergence { variable, witness } => {
                writeln!(f, "Programs are not equivalent: variable '{variable}' can differ")?;
                writeln!(f)?;
                writeln!(f, "Input values:")?;
                write_values(f, &witness.inputs)?;
                writeln!(f, "\n\nProgram 1 values:")?;
                write_values(f, &witness.program1)?;
                writeln!(f, "\n\nProgram 2 values:")?;
                write_values(f, &witness.program2)
            }
            EquivalenceResult::AssertionDivergence {
                index,
                program1,
                program2,
                witness,
            } => {
                writeln!(
                    f,
                    "Programs are not equivalent: assertion {} behaves differently",
                    index + 1
                )?;
                writeln!(f)?;
                writeln!(f, "Input values:")?;
                write_values(f, &witness.inputs)?;
                for (label, side, values) in [
                    ("Program 1", program1, &witness.program1),
                    ("Program 2", program2, &witness.program2),
                ] {
                    writeln!(f, "\n\n{label}:")?;
                    writeln!(f, "Assertion: {}", side.assertion)?;
                    writeln!(f, "Under condition: {}", side.guard)?;
                    write_values(f, values)?;
                }
                Ok(())
            }
            EquivalenceResult::NoCommonVariables => write!(
                f,
                "Programs are not equivalent: no common variables to compare"
            ),
            EquivalenceResult::Error { message } => {
                write!(f, "Error checking equivalence: {message}")
            }
        }
    }
}
