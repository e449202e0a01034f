use criterion::{criterion_group, criterion_main, Criterion};
use sdb_bson::{doc, from_document, to_document, Builder, Document};
use serde::{Deserialize, Serialize};
use std::hint::black_box;

#[derive(Serialize, Deserialize)]
struct Profile {
    name: String,
    age: i32,
    active: bool,
    score: f64,
    tags: Vec<String>,
}

fn sample_document() -> Document<'static> {
    let mut builder = Builder::new();
    builder.append_string("name", "sdb").unwrap();
    builder.append_i32("age", 16).unwrap();
    builder.append_bool("active", true).unwrap();
    builder.append_double("score", 99.5).unwrap();
    builder.append_i64("big", 1 << 40).unwrap();
    builder.finish().unwrap();
    builder.into_document().unwrap()
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("builder_flat", |b| {
        b.iter(|| {
            let mut builder = Builder::new();
            builder.append_string("name", "sdb").unwrap();
            builder.append_i32("age", 16).unwrap();
            builder.append_bool("active", true).unwrap();
            builder.append_double("score", 99.5).unwrap();
            builder.finish().unwrap();
            builder.into_document().unwrap()
        })
    });
}

fn bench_nested_build(c: &mut Criterion) {
    c.bench_function("builder_nested", |b| {
        b.iter(|| {
            let mut builder = Builder::new();
            builder.append_string("name", "sdb").unwrap();
            let mut child = builder.start_document("address").unwrap();
            child.append_string("street", "123 Main St").unwrap();
            child.append_string("city", "Tokyo").unwrap();
            child.finish().unwrap();
            let scope = child.into_scope();
            builder.end_document(scope).unwrap();
            builder.finish().unwrap();
            builder.into_document().unwrap()
        })
    });
}

fn bench_iterate(c: &mut Criterion) {
    let document = sample_document();
    c.bench_function("iterate", |b| {
        b.iter(|| {
            let mut count = 0;
            for element in document.iter() {
                black_box(element.unwrap());
                count += 1;
            }
            count
        })
    });
}

fn bench_get(c: &mut Criterion) {
    let document = sample_document();
    c.bench_function("get_last_field", |b| {
        b.iter(|| document.get(black_box("big")).unwrap())
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let d = doc! {
        "name": "sdb",
        "ports": vec![11810, 11820],
        "inner": doc! { "x": 1.5 },
    };
    c.bench_function("doc_to_document", |b| b.iter(|| d.to_document().unwrap()));
}

fn bench_serde(c: &mut Criterion) {
    let profile = Profile {
        name: "sdb".into(),
        age: 16,
        active: true,
        score: 99.5,
        tags: vec!["a".into(), "b".into()],
    };
    let document = to_document(&profile).unwrap();

    c.bench_function("to_document", |b| b.iter(|| to_document(&profile).unwrap()));
    c.bench_function("from_document", |b| {
        b.iter(|| from_document::<Profile>(&document).unwrap())
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_nested_build,
    bench_iterate,
    bench_get,
    bench_dispatch,
    bench_serde,
);

criterion_main!(benches);
