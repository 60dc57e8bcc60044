use cinder_compiler::{parse_source, CompilationUnit, CompileOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const PROGRAM: &str = r#"
type Point {
    x = 0;
    y = 0;
    function $construct(x, y) { this.x = x; this.y = y; }
    function len2() { return this.x * this.x + this.y * this.y; }
}

enum Kind { Small, Large = 10 }

function id<T>(x: T): T { return x; }

function classify(p) {
    let d = p.len2();
    if (d < 10) return Kind.Small;
    return Kind.Large;
}

let total = 0;
for (let i = 0; i < 100; i++) {
    let p = new Point(i, id<number>(i) + 1);
    try {
        total += classify(p);
        if (total > 500) break;
    } catch (e) {
        total = 0;
    }
}
"#;

/// `PROGRAM` repeated `n` times inside function bodies so names do not clash.
fn scaled(n: usize) -> String {
    let mut source = String::from(PROGRAM);
    for i in 0..n {
        source.push_str(&format!(
            "function copy{}() {{ let s = 0; let k = 0; while (k < 10) {{ s = s + k * {}; k++; }} return s; }}\n",
            i, i
        ));
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for n in [0usize, 50, 500] {
        let source = scaled(n);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| parse_source(black_box(source)));
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for optimize in [false, true] {
        let source = scaled(50);
        let name = if optimize { "optimized" } else { "plain" };
        group.bench_with_input(BenchmarkId::new(name, 50), &source, |b, source| {
            b.iter(|| {
                let mut unit = CompilationUnit::new(CompileOptions {
                    optimize,
                    ..CompileOptions::default()
                });
                let outcome = unit.compile_module("bench", black_box(source));
                assert!(outcome.is_success());
                outcome
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile);
criterion_main!(benches);
