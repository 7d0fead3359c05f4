#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Neither parser entry point may panic on any input.
        if let Ok(program) = minilang_dsl::parse(s, "fuzz.ml") {
            let printed = minilang_dsl::printer::format_program(&program);
            let reparsed = minilang_dsl::parse(&printed, "printed.ml").expect("printer output reparses");
            // Spans differ after re-printing, so compare the span-free rendering.
            assert_eq!(
                minilang_dsl::printer::ast_to_string(&reparsed),
                minilang_dsl::printer::ast_to_string(&program)
            );
        }
        let _ = minilang_dsl::parse_tree(s, "fuzz.ml");
    }
});
