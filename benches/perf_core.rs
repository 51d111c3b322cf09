use buildmend::diagnostics::DiagnosticExtractor;
use buildmend::locate::SourceLocator;
use buildmend::tree::java::JavaTree;
use buildmend::tree::SourceTree;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write as _;
use std::fs;

fn synthetic_build_output(error_lines: usize, file_count: usize) -> Vec<String> {
    let mut lines = vec!["[INFO] Scanning for projects...".to_string()];
    for i in 0..error_lines {
        let file = i % file_count;
        lines.push(format!(
            "[ERROR] /work/src/main/java/com/example/File{:03}.java:[{},9] cannot find symbol",
            file,
            10 + i % 40
        ));
        lines.push(format!("[INFO] noise line {}", i));
    }
    lines
}

fn synthetic_java_source(method_count: usize) -> String {
    let mut source = String::from("package com.example;\n\npublic class Big {\n");
    for i in 0..method_count {
        let _ = write!(
            source,
            "    public int method{i}() {{\n        int v = helper{i}();\n        return v;\n    }}\n\n"
        );
    }
    source.push_str("}\n");
    source
}

fn bench_diagnostic_extraction(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("src/main/java/com/example");
    fs::create_dir_all(&root).expect("mkdir");
    for i in 0..20 {
        fs::write(root.join(format!("File{:03}.java", i)), "class X {}\n").expect("write");
    }
    let locator = SourceLocator::new(
        dir.path().join("src/main/java"),
        dir.path().join("src/test/java"),
    );
    let extractor = DiagnosticExtractor::new();
    let output = synthetic_build_output(400, 20);

    c.bench_function("extract_400_errors_20_files", |b| {
        b.iter(|| {
            let records = extractor.extract(black_box(&output), &locator);
            black_box(records.len())
        })
    });
}

fn bench_tree_queries(c: &mut Criterion) {
    let source = synthetic_java_source(120);
    let line_count = source.lines().count();

    c.bench_function("parse_120_method_class", |b| {
        b.iter(|| JavaTree::parse(black_box(source.clone())).expect("parse"))
    });

    let tree = JavaTree::parse(source.clone()).expect("parse");
    c.bench_function("elements_at_full_scan", |b| {
        b.iter(|| {
            let mut found = 0usize;
            for line in 1..=line_count {
                found += tree.elements_at(black_box(line)).len();
            }
            black_box(found)
        })
    });
}

fn bench_delete_and_print(c: &mut Criterion) {
    let source = synthetic_java_source(120);

    c.bench_function("delete_120_statements_and_print", |b| {
        b.iter(|| {
            let mut tree = JavaTree::parse(black_box(source.clone())).expect("parse");
            let line_count = source.lines().count();
            for line in 1..=line_count {
                for element in tree.elements_at(line) {
                    tree.delete(&element);
                    break;
                }
            }
            black_box(tree.print().len())
        })
    });
}

criterion_group!(
    benches,
    bench_diagnostic_extraction,
    bench_tree_queries,
    bench_delete_and_print
);
criterion_main!(benches);
