//! Criterion benchmarks for assetflow critical paths
//!
//! Benchmarks the per-file work that dominates a build:
//! - Styles: prefix and minify a stylesheet
//! - Scripts: parse, lower and minify a script
//! - Discovery: expand a recursive glob over a source tree
//! - Quantize: median-cut palette reduction

use assetflow::build::SourceGlob;
use assetflow::config::{BrowserTargets, ScriptsConfig, StylesConfig};
use assetflow::stages::quantize::quantize_image;
use assetflow::stages::scripts::compile_script;
use assetflow::stages::styles::finish_css;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Generate a stylesheet with n rules, some needing prefixes
fn make_stylesheet(rules: usize) -> String {
    (0..rules)
        .map(|i| {
            format!(
                ".rule-{} {{\n  color: #{:02x}{:02x}{:02x};\n  user-select: none;\n  display: flex;\n}}\n",
                i,
                i % 256,
                (i * 7) % 256,
                (i * 13) % 256
            )
        })
        .collect()
}

/// Generate a script with n small functions
fn make_script(functions: usize) -> String {
    (0..functions)
        .map(|i| format!("function f{}(a, b) {{ var total = a ** {} + b; return total; }}\n", i, i % 4))
        .collect()
}

/// Lay out `count` files over a few nested directories
fn make_tree(root: &Path, count: usize) {
    for i in 0..count {
        let dir = root.join(format!("public/stylesheets/d{}/e{}", i % 8, i % 3));
        fs::create_dir_all(&dir).expect("create dir");
        let ext = if i % 4 == 0 { "scss" } else { "css" };
        fs::write(dir.join(format!("f{}.{}", i, ext)), "a{}").expect("write file");
    }
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_styles(c: &mut Criterion) {
    let mut group = c.benchmark_group("styles");
    let config = StylesConfig::default();
    let prefixed = StylesConfig { targets: BrowserTargets::stock(), ..StylesConfig::default() };

    for rules in [10, 100, 1000].iter() {
        let css = make_stylesheet(*rules);
        group.throughput(Throughput::Bytes(css.len() as u64));
        group.bench_with_input(BenchmarkId::new("minify", rules), &css, |b, css| {
            b.iter(|| finish_css(black_box(css), "bench.css", &config))
        });
        group.bench_with_input(BenchmarkId::new("prefix_minify", rules), &css, |b, css| {
            b.iter(|| finish_css(black_box(css), "bench.css", &prefixed))
        });
    }

    group.finish();
}

fn bench_scripts(c: &mut Criterion) {
    let mut group = c.benchmark_group("scripts");
    let config = ScriptsConfig::default();

    for functions in [10, 100, 500].iter() {
        let js = make_script(*functions);
        group.throughput(Throughput::Bytes(js.len() as u64));
        group.bench_with_input(BenchmarkId::new("compile", functions), &js, |b, js| {
            b.iter(|| compile_script(black_box(js), Path::new("bench.js"), &config))
        });
    }

    group.finish();
}

fn bench_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery");

    for count in [100, 1000].iter() {
        let temp = TempDir::new().expect("temp dir");
        make_tree(temp.path(), *count);
        let glob = SourceGlob::new(temp.path(), "public/stylesheets/**/*.css").expect("glob");

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("discover", count), &glob, |b, glob| {
            b.iter(|| glob.discover(None))
        });
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize");

    for size in [32u32, 128].iter() {
        let image = RgbaImage::from_fn(*size, *size, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x ^ y) % 256) as u8, 255])
        });
        group.throughput(Throughput::Elements((*size * *size) as u64));
        group.bench_with_input(BenchmarkId::new("median_cut", size), &image, |b, image| {
            b.iter(|| quantize_image(black_box(image), 64))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_styles, bench_scripts, bench_discovery, bench_quantize);

criterion_main!(benches);
