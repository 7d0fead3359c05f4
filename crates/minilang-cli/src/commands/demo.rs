//! `demo`: every stage on two built-in programs.

use serde_json::json;

use minilang_dsl::printer::ast_to_string;
use minilang_engine::pipeline::{analyze_source, check_assertions, check_equivalence};

use crate::commands::helpers::{pipeline_report, print_json};
use crate::types::{OutputFormat, RunCfg};

pub(crate) const SAMPLE_PROGRAM: &str = "\
x := 0;
for (i := 0; i < 3; i := i + 1) {
    x := x + 1;
}
assert(x >= 3);
";

pub(crate) const SAMPLE_PROGRAM_2: &str = "\
x := 1;
y := x + 2;
for (i := 0; i < 3; i := i + 1) {
    y := y + 1;
}
assert(y >= 0);
";

fn section(title: &str) {
    println!("\n{title}");
    println!("----------------------------------------");
}

pub(crate) fn run_demo_command(cfg: &RunCfg) -> miette::Result<()> {
    let options = &cfg.options;
    let first = analyze_source(SAMPLE_PROGRAM, "sample1.ml", options).map_err(pipeline_report)?;
    let second = analyze_source(SAMPLE_PROGRAM_2, "sample2.ml", options).map_err(pipeline_report)?;
    let verification = check_assertions(&first.ssa, options).map_err(pipeline_report)?;
    let equivalence = check_equivalence(&first.ssa, &second.ssa, options);

    if cfg.format == OutputFormat::Json {
        return print_json(&json!({
            "program1": {
                "source": SAMPLE_PROGRAM,
                "ast": first.program,
                "ssa": first.ssa,
            },
            "program2": {
                "source": SAMPLE_PROGRAM_2,
                "ssa": second.ssa,
            },
            "verification": verification,
            "equivalence": equivalence,
        }));
    }

    section("Program:");
    print!("{SAMPLE_PROGRAM}");
    section("Parse Tree:");
    println!("{}", minilang_dsl::parse_tree(SAMPLE_PROGRAM, "sample1.ml")?);
    section("Abstract Syntax Tree (AST):");
    println!("{}", ast_to_string(&first.program));
    section("Static Single Assignment (SSA) Form:");
    println!("{}", first.ssa);
    section("Program Verification (SMT):");
    println!("{verification}");
    section("Program Equivalence Check:");
    println!("Second program:");
    print!("{SAMPLE_PROGRAM_2}");
    println!("\nProgram 1 SSA:\n{}", first.ssa);
    println!("\nProgram 2 SSA:\n{}", second.ssa);
    println!("\nEquivalence result:\n{equivalence}");
    Ok(())
}
