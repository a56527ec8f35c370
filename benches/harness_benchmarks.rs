//! Performance benchmarks for the harness front half
//!
//! Run with: cargo bench
//!
//! Covers the work done per test before any child process starts:
//! manifest parsing, include expansion and classification.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;
use test262_harness::case::{TestCase, TestSource};
use test262_harness::classify::{Classifier, CuratedLists, Mode};
use test262_harness::manifest::parse_manifest;
use test262_harness::preprocess::{FixedTimezone, Preprocessor};

fn manifest_text(lines: usize) -> String {
    let mut text = String::from("# generated\n");
    for i in 0..lines {
        if i % 10 == 0 {
            text.push_str("{\n");
            text.push_str(&format!("test262/test/suite/ch{:02}/disabled\n", i % 16));
            text.push_str("}\n");
        }
        text.push_str(&format!("test262/test/suite/ch{:02}/{}.{}\n", i % 16, i % 16, i));
    }
    text
}

/// Benchmark: manifest parsing
fn bench_manifest(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest");
    for lines in [100, 1000] {
        let text = manifest_text(lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &text, |b, text| {
            b.iter(|| parse_manifest(black_box(text)))
        });
    }
    group.finish();
}

/// Benchmark: classification against the built-in lists
fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::new(CuratedLists::builtin());
    let root = Path::new("/work/test");
    let case = TestCase::new(root.join("test262/test/suite/ch07/7.3/S7.3_A2.4.js"), root);
    let negative = TestSource::new("/**\n * @negative\n */\neval(\"\\u2029\");\n");

    c.bench_function("classify_negative", |b| {
        b.iter(|| classifier.classify(black_box(&case), black_box(&negative), Mode::CompileAndRun))
    });
}

/// Benchmark: `$INCLUDE` expansion
fn bench_expand(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.js"), "function lib() {}\n".repeat(50)).unwrap();
    let preprocessor =
        Preprocessor::with_timezone(dir.path(), dir.path(), Box::new(FixedTimezone::default()));
    let source = format!("$INCLUDE(\"lib.js\");\n{}", "var x = lib();\n".repeat(200));

    c.bench_function("expand_include", |b| {
        b.iter(|| preprocessor.expand(black_box(&source)).unwrap())
    });
}

criterion_group!(benches, bench_manifest, bench_classify, bench_expand);
criterion_main!(benches);
