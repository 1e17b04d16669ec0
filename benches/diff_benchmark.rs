use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};
use site_vision::compare::{DiffOptions, diff_images, pixelmatch};

fn striped(width: u32, height: u32, offset: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y + offset) % 16 < 8 {
            Rgba([30, 60, 90, 255])
        } else {
            Rgba([240, 240, 240, 255])
        }
    })
}

fn benchmark_pixelmatch(c: &mut Criterion) {
    let options = DiffOptions::default();
    let baseline = striped(512, 512, 0);
    let current = striped(512, 512, 3);
    let mut output = vec![0u8; baseline.as_raw().len()];

    c.bench_function("pixelmatch_512_changed", |b| {
        b.iter(|| {
            let result = pixelmatch(
                black_box(baseline.as_raw()),
                black_box(current.as_raw()),
                &mut output,
                512,
                512,
                &options,
            );
            assert!(result.is_ok());
        })
    });

    c.bench_function("pixelmatch_512_identical", |b| {
        b.iter(|| {
            let result = pixelmatch(
                black_box(baseline.as_raw()),
                black_box(baseline.as_raw()),
                &mut output,
                512,
                512,
                &options,
            );
            assert!(result.is_ok());
        })
    });
}

fn benchmark_padded_diff(c: &mut Criterion) {
    let options = DiffOptions::default();
    let baseline = striped(512, 384, 0);
    let current = striped(512, 512, 0);

    c.bench_function("diff_images_padded", |b| {
        b.iter(|| {
            let result = diff_images(black_box(&baseline), black_box(&current), &options);
            assert!(result.is_ok());
        })
    });
}

criterion_group!(benches, benchmark_pixelmatch, benchmark_padded_diff);
criterion_main!(benches);
