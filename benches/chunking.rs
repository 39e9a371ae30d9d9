//! Splitter and embedding hot paths used during ingestion and search.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use routed_rag::index::embedding::cosine_similarity;
use routed_rag::index::{HashEmbedder, TextSplitter};

fn sample_document() -> String {
    let paragraph = "Kredivo offers instant credit for online and offline purchases. \
                     Customers can split payments into installments and track them in the app.\n";
    let mut text = String::new();
    for i in 0..200 {
        text.push_str(&format!("Section {i}\n"));
        text.push_str(paragraph);
        text.push('\n');
    }
    text
}

fn bench_splitter(c: &mut Criterion) {
    let text = sample_document();
    let parent = TextSplitter::default_parent();
    let child = TextSplitter::default_child();

    c.bench_function("split_parents", |b| b.iter(|| parent.split(black_box(&text))));

    c.bench_function("split_parent_child", |b| {
        b.iter(|| {
            parent
                .split(black_box(&text))
                .iter()
                .map(|p| child.split(p).len())
                .sum::<usize>()
        });
    });

    let unbroken = "x".repeat(20_000);
    c.bench_function("split_no_separators", |b| {
        b.iter(|| child.split(black_box(&unbroken)));
    });
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = HashEmbedder::new(256);
    let query = embedder.embed_one("founder, kredivo, history, who founded kredivo?");
    let passage = embedder.embed_one(&sample_document());

    c.bench_function("hash_embed_query", |b| {
        b.iter(|| embedder.embed_one(black_box("who founded kredivo?")));
    });

    c.bench_function("cosine_256", |b| {
        b.iter(|| cosine_similarity(black_box(&query), black_box(&passage)));
    });
}

criterion_group!(benches, bench_splitter, bench_embedding);
criterion_main!(benches);
