use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minilang_engine::pipeline::{
    analyze_source, check_assertions, check_equivalence, PipelineOptions, SolverChoice,
};

const VERIFY_EXAMPLE: &str = "\
x := 10;
y := 5;
if (x > y) {
    z := x + y;
}
y := z - 2;
assert(y >= 0);
";

const NESTED_LOOPS: &str = "\
s := 0;
for (i := 0; i < 3; i := i + 1) {
    for (j := 0; j < 3; j := j + 1) {
        s := s + j;
    }
    s := s + i;
}
assert(s >= 0);
";

fn bench_options(unroll_bound: usize) -> PipelineOptions {
    PipelineOptions {
        solver: SolverChoice::Bounded,
        unroll_bound,
        ..PipelineOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Front end + encoding
// ---------------------------------------------------------------------------

fn bench_ssa_and_encode(c: &mut Criterion) {
    let options = bench_options(8);
    c.bench_function("engine_ssa_and_encode_nested_loops", |b| {
        b.iter(|| {
            let analyzed = analyze_source(black_box(NESTED_LOOPS), "nested.ml", &options).unwrap();
            minilang_smt::encoder::encode(black_box(&analyzed.ssa)).unwrap()
        })
    });
}

// ---------------------------------------------------------------------------
// Solving
// ---------------------------------------------------------------------------

fn bench_check_assertions(c: &mut Criterion) {
    let options = bench_options(3);
    let analyzed = analyze_source(VERIFY_EXAMPLE, "verify.ml", &options).unwrap();
    c.bench_function("engine_check_assertions_bounded", |b| {
        b.iter(|| check_assertions(black_box(&analyzed.ssa), &options).unwrap())
    });
}

fn bench_self_equivalence(c: &mut Criterion) {
    let options = bench_options(3);
    let first = analyze_source(NESTED_LOOPS, "a.ml", &options).unwrap();
    let second = analyze_source(NESTED_LOOPS, "b.ml", &options).unwrap();
    c.bench_function("engine_self_equivalence_bounded", |b| {
        b.iter(|| check_equivalence(black_box(&first.ssa), black_box(&second.ssa), &options))
    });
}

criterion_group!(
    benches,
    bench_ssa_and_encode,
    bench_check_assertions,
    bench_self_equivalence
);
criterion_main!(benches);
