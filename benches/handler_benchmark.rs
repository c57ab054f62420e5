use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hybrid_classifier::{AdapterConfig, Handler, Input, NdArray, PaddingStrategy, TextClassification};
use ndarray::Array2;

fn setup_benchmark_handler(config: AdapterConfig) -> TextClassification {
    TextClassification::builder()
        .with_config(config)
        .with_tokenizer_file("tests/fixtures/tokenizer.json")
        .unwrap()
        .with_labels_json(r#"{"0": "negative", "1": "positive"}"#)
        .unwrap()
        .build_text_classification()
        .unwrap()
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preprocess");

    // Configure sampling
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let handler = setup_benchmark_handler(AdapterConfig::default());
    let short = Input::from_text("great product");
    group.bench_function("short_text", |b| b.iter(|| {
        handler.preprocess(black_box(&short)).unwrap()
    }));

    // Long text gets truncated to max_length
    let long = Input::from_text("this movie is great but the product is bad . ".repeat(50));
    group.bench_function("long_text", |b| b.iter(|| {
        handler.preprocess(black_box(&long)).unwrap()
    }));

    let padded = setup_benchmark_handler(
        AdapterConfig::default().with_max_length(512).with_padding(PaddingStrategy::MaxLength),
    );
    group.bench_function("pad_to_512", |b| b.iter(|| {
        padded.preprocess(black_box(&short)).unwrap()
    }));

    group.finish();
}

fn bench_postprocess(c: &mut Criterion) {
    let handler = setup_benchmark_handler(AdapterConfig::default());
    let mut group = c.benchmark_group("Postprocess");
    group.sample_size(50);

    for rows in [1usize, 32, 256] {
        let scores = Array2::from_shape_fn((rows, 2), |(r, c)| ((r * 7 + c * 3) % 5) as f32);
        let input = Input::from_numpy(&[NdArray::from(scores.into_dyn())]).unwrap();
        group.bench_function(format!("rows_{}", rows), |b| b.iter(|| {
            handler.postprocess(black_box(&input)).unwrap()
        }));
    }

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_postprocess);
criterion_main!(benches);
