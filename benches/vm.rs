//! VM benchmarks for Lumen.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lumenlang::bytecode::Vm;

/// Compile and execute with output discarded, so print-heavy programs
/// don't measure terminal throughput.
fn run_program(source: &str) {
    let function = lumenlang::compile(source).expect("compile error");
    let (mut vm, _output) = Vm::with_captured_output();
    vm.interpret(function).expect("runtime error");
}

fn fibonacci_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");

    let recursive = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);
    "#;
    group.bench_function("recursive_fib15", |b| {
        b.iter(|| run_program(black_box(recursive)))
    });

    let iterative = r#"
        var a = 0;
        var b = 1;
        for (var i = 0; i < 30; i = i + 1) {
            var next = a + b;
            a = b;
            b = next;
        }
        print a;
    "#;
    group.bench_function("iterative_fib30", |b| {
        b.iter(|| run_program(black_box(iterative)))
    });

    group.finish();
}

fn loop_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops");

    let sum = r#"
        var total = 0;
        for (var i = 0; i < 10000; i = i + 1) {
            total = total + i;
        }
        print total;
    "#;
    group.bench_function("sum_10000", |b| b.iter(|| run_program(black_box(sum))));

    group.finish();
}

fn closure_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("closures");

    let counter = r#"
        fun make_counter() {
            var count = 0;
            fun increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var tick = make_counter();
        for (var i = 0; i < 1000; i = i + 1) {
            tick();
        }
        print tick();
    "#;
    group.bench_function("counter_1000", |b| {
        b.iter(|| run_program(black_box(counter)))
    });

    group.finish();
}

fn array_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrays");

    let ops = r#"
        var items = [];
        for (var i = 0; i < 1000; i = i + 1) {
            push(items, i * 2);
        }
        var total = 0;
        for (var i = 0; i < len(items); i = i + 1) {
            total = total + items[i];
        }
        print total;
    "#;
    group.bench_function("push_index_1000", |b| {
        b.iter(|| run_program(black_box(ops)))
    });

    group.finish();
}

fn compile_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    // Each global declaration spends four constant-pool slots, so the
    // count stays well under the 256-per-chunk limit.
    let mut source = String::new();
    for i in 0..50 {
        source.push_str(&format!("var v{} = {} * 2 + 1;\n", i, i));
    }
    group.bench_function("50_statements", |b| {
        b.iter(|| lumenlang::compile(black_box(&source)).expect("compile error"))
    });

    group.finish();
}

criterion_group!(
    benches,
    fibonacci_benchmarks,
    loop_benchmarks,
    closure_benchmarks,
    array_benchmarks,
    compile_benchmarks
);
criterion_main!(benches);
