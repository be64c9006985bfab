use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{ImageFormat, RgbImage};
use inference::backend::mock::{MockBackend, MockModel};
use inference::classify::{argmax_first_row, infer};
use ndarray::{Array, IxDyn};
use preprocess::ImagePreprocessor;
use std::io::Cursor;

/// Scores that put the maximum in the last class, forcing a full scan
fn create_scores(num_classes: usize) -> Array<f32, IxDyn> {
    let data: Vec<f32> = (0..num_classes).map(|i| i as f32 / num_classes as f32).collect();
    Array::from_shape_vec(IxDyn(&[1, num_classes]), data).unwrap()
}

fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

fn benchmark_argmax(c: &mut Criterion) {
    let mut group = c.benchmark_group("argmax");

    for num_classes in [10, 101, 1000] {
        let scores = create_scores(num_classes);
        group.bench_with_input(
            BenchmarkId::new("first_row", num_classes),
            &scores,
            |b, scores| b.iter(|| argmax_first_row(black_box(&scores.view())).unwrap()),
        );
    }

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    let preprocessor = ImagePreprocessor::default();
    let backend = MockBackend::new(MockModel::Scores {
        scores: create_scores(101).into_raw_vec_and_offset().0,
    });

    let resolutions = [(320, 240), (640, 480), (1920, 1080)];

    for (width, height) in resolutions {
        let jpeg = create_jpeg(width, height);

        group.bench_with_input(
            BenchmarkId::new("preprocess_and_classify", format!("{width}x{height}")),
            &jpeg,
            |b, jpeg| {
                b.iter(|| {
                    let tensor = preprocessor.preprocess(black_box(jpeg)).unwrap();
                    infer(&backend, &tensor).unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_argmax, benchmark_pipeline);
criterion_main!(benches);
