//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Bounded analysis of small imperative programs.\n\n\
    Programs are parsed, loops are unrolled a fixed number of times, the result\n\
    is put in SSA form and encoded as integer constraints for an SMT solver.\n\n\
    Typical use:\n  \
    1. minilang ssa prog.ml\n  \
    2. minilang verify prog.ml\n  \
    3. minilang equiv prog.ml refactored.ml\n\n\
    Every FILE argument accepts `-` for standard input.";

#[derive(Parser)]
#[command(name = "minilang")]
#[command(about = "Bounded assertion and equivalence checking for minilang programs")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Solver backend: z3 | cvc5 | bounded
    #[arg(long, global = true, default_value = "z3")]
    pub(crate) solver: String,

    /// Number of guarded copies emitted per loop
    #[arg(long, global = true, default_value_t = 3)]
    pub(crate) unroll: usize,

    /// Per-query solver timeout in seconds (0 disables)
    #[arg(long, global = true, default_value_t = 30)]
    pub(crate) timeout: u64,

    /// Version merge at if/else joins: last-branch-wins | phi-at-join
    #[arg(long, global = true, default_value = "last-branch-wins")]
    pub(crate) merge: String,

    /// Output format: text | json
    #[arg(long, global = true, default_value = "text")]
    pub(crate) format: String,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the raw parse tree
    ParseTree {
        /// Program file, or `-` for stdin
        file: PathBuf,
    },

    /// Print the abstract syntax tree
    Ast {
        /// Program file, or `-` for stdin
        file: PathBuf,
    },

    /// Print the program with every loop unrolled
    Unroll {
        /// Program file, or `-` for stdin
        file: PathBuf,
    },

    /// Print the SSA listing of the unrolled program
    Ssa {
        /// Program file, or `-` for stdin
        file: PathBuf,
    },

    /// Print the SMT-LIB2 script for the program's constraints
    Smt {
        /// Program file, or `-` for stdin
        file: PathBuf,
    },

    /// Check whether the program's assertions can all hold
    Verify {
        /// Program file, or `-` for stdin
        file: PathBuf,

        /// Also write the SMT-LIB2 script to this path
        #[arg(long)]
        dump_smt: Option<PathBuf>,
    },

    /// Compare two programs on their common variables and assertions
    Equiv {
        /// First program file
        file1: PathBuf,

        /// Second program file
        file2: PathBuf,
    },

    /// Run every stage on the two built-in sample programs
    Demo,
}
