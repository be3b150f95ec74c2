/*!
 * Conversion Benchmarks
 * Pure hot paths: cost estimation and content-to-HTML conversion
 */

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docgen::convert::render_to_html;
use docgen::{estimated_cost, JobPayload, RenderOptions};

fn bench_estimated_cost(c: &mut Criterion) {
    let payload = JobPayload::new("html", "x".repeat(10 * 1024));
    c.bench_function("estimated_cost_10k", |b| {
        b.iter(|| estimated_cost(black_box(&payload)).unwrap())
    });
}

fn bench_markdown(c: &mut Criterion) {
    let source = "# Listing\n\n| beds | baths |\n|---|---|\n| 3 | 2 |\n\nA *quiet* street.\n"
        .repeat(64);
    let options = RenderOptions::default();
    c.bench_function("markdown_to_document", |b| {
        b.iter(|| render_to_html("markdown", black_box(&source), None, &options).unwrap())
    });
}

fn bench_json_table(c: &mut Criterion) {
    let listings: Vec<serde_json::Value> = (0..128)
        .map(|i| {
            serde_json::json!({
                "street": format!("{} Elm St", i),
                "beds": 3,
                "baths": 2,
                "price": 450_000 + i * 1_000,
            })
        })
        .collect();
    let content = serde_json::to_string(&listings).unwrap();
    let options = RenderOptions::default();
    c.bench_function("json_to_table", |b| {
        b.iter(|| render_to_html("json", black_box(&content), None, &options).unwrap())
    });
}

criterion_group!(
    benches,
    bench_estimated_cost,
    bench_markdown,
    bench_json_table
);
criterion_main!(benches);
