#![no_main]
use libfuzzer_sys::fuzz_target;

/// Nested loops multiply under unrolling; keep inputs small enough to finish.
const MAX_LOOPS: usize = 4;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if s.matches("for").count() + s.matches("while").count() > MAX_LOOPS {
            return;
        }
        if let Ok(program) = minilang_dsl::parse(s, "fuzz.ml") {
            let unrolled = minilang_dsl::unroll(&program, 3);
            assert!(unrolled.is_loop_free());
            for policy in [
                minilang_ir::MergePolicy::LastBranchWins,
                minilang_ir::MergePolicy::PhiAtJoin,
            ] {
                let ssa = minilang_ir::convert_to_ssa_with(&unrolled, policy)
                    .expect("unrolled programs convert");
                // Encode only; solving is out of scope for fuzzing.
                if let Ok(encoding) = minilang_smt::encoder::encode(&ssa) {
                    let _ = encoding.to_smtlib_script();
                }
            }
        }
    }
});
