use criterion::{black_box, criterion_group, criterion_main, Criterion};

use image::{GrayImage, Luma};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sgbm_disparity::{aggregate::aggregate_costs, cost::build_cost_volume, prelude::*};

/// A 160x120 textured pair shifted by 8 pixels.
fn load_frame() -> (GrayImage, GrayImage) {
    let mut rng = Pcg64::seed_from_u64(0);
    let base = GrayImage::from_fn(168, 120, |_, _| Luma([rng.gen()]));
    let left = GrayImage::from_fn(160, 120, |x, y| *base.get_pixel(x, y));
    let right = GrayImage::from_fn(160, 120, |x, y| *base.get_pixel(x + 8, y));
    (left, right)
}

fn params() -> Params {
    Params {
        num_disparities: 32,
        ..Default::default()
    }
}

fn sgbm_bench(c: &mut Criterion) {
    let (left, right) = load_frame();
    let mut matcher = SemiGlobal::new(params()).unwrap();
    let frame = StereoFrame::new(&left, &right);

    c.bench_function("sgbm 160x120x32", |b| b.iter(|| matcher.compute(black_box(&frame))));
}

fn stage_bench(c: &mut Criterion) {
    let (left, right) = load_frame();
    let params = params();

    c.bench_function("cost volume 160x120x32", |b| {
        b.iter(|| build_cost_volume(black_box(&left), black_box(&right), &params))
    });

    let cost = build_cost_volume(&left, &right, &params);
    c.bench_function("aggregation 160x120x32", |b| {
        b.iter(|| aggregate_costs(black_box(&cost), &left, &params))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = sgbm_bench, stage_bench
);
criterion_main!(benches);
