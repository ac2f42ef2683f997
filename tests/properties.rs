//! Behaviour of the full matcher on synthetic stereo pairs.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, Luma};
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sgbm_disparity::{
    aggregate::aggregate_costs,
    cost::{build_cost_volume, CostVolume},
    prelude::*,
    select::winner_take_all,
    speckle::filter_speckles
};

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = Pcg64::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen()]))
}

/// A pair where every left pixel `x` appears at `x - shift` in the right image.
fn shifted_pair(width: u32, height: u32, shift: u32, seed: u64) -> (GrayImage, GrayImage) {
    let base = noise(width + shift, height, seed);
    let left = GrayImage::from_fn(width, height, |x, y| *base.get_pixel(x, y));
    let right = GrayImage::from_fn(width, height, |x, y| *base.get_pixel(x + shift, y));
    (left, right)
}

fn params() -> Params {
    let block_size = 5;
    Params {
        min_disparity: 0,
        num_disparities: 16,
        block_size,
        p1: 8 * block_size * block_size,
        p2: 32 * block_size * block_size,
        speckle_range: 2,
        ..Default::default()
    }
}

/// Count of horizontally or vertically adjacent valid pixels differing by more than one.
fn jumps(map: &DisparityMap) -> usize {
    let mut count = 0;
    for y in 0..map.height() {
        for x in 0..map.width() {
            if !map.is_valid(x, y) {
                continue;
            }
            let here = map.get(x, y);
            for &(nx, ny) in &[(x + 1, y), (x, y + 1)] {
                if nx < map.width() && ny < map.height() && map.is_valid(nx, ny) {
                    if (map.get(nx, ny) - here).abs() > 1.0 {
                        count += 1;
                    }
                }
            }
        }
    }
    count
}

/// Window costs computed pixel by pixel with absolute differences.
fn direct_window_costs(left: &GrayImage, right: &GrayImage, params: &Params) -> Array3<u32> {
    let (width, height) = (left.width() as i64, left.height() as i64);
    let radius = params.block_radius() as i64;
    let clamp = |v: i64, len: i64| v.max(0).min(len - 1);
    let mut out = Array3::zeros((height as usize, width as usize, params.disparity_count()));

    for ((y, x, d), cell) in out.indexed_iter_mut() {
        let disp = params.min_disparity as i64 + d as i64;
        if x as i64 - disp < 0 || x as i64 - disp >= width {
            *cell = params.max_window_cost();
            continue;
        }
        let mut total = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let yc = clamp(y as i64 + dy, height) as u32;
                let xc = clamp(x as i64 + dx, width);
                let xr = xc - disp;
                total += if xr < 0 || xr >= width {
                    params.max_pixel_cost()
                }
                else {
                    let l = left.get_pixel(xc as u32, yc)[0] as i32;
                    let r = right.get_pixel(xr as u32, yc)[0] as i32;
                    (l - r).abs() as u32
                };
            }
        }
        *cell = total;
    }
    out
}

/// Path costs summed over all directions, each path walked pixel by pixel.
fn direct_aggregation(cost: &Array3<u32>, guide: &GrayImage, params: &Params) -> Array3<u32> {
    let (height, width, num_disp) = cost.dim();
    let mut paths = vec![(0i64, 1i64), (0, -1), (1, 0), (-1, 0)];
    if params.directions == Directions::Eight {
        paths.extend_from_slice(&[(1, 1), (1, -1), (-1, 1), (-1, -1)]);
    }
    let (p1, p2) = (params.p1 as u32, params.p2 as u32);
    let mut sum = Array3::<u32>::zeros(cost.dim());

    for (drow, dcol) in paths {
        let mut path = Array3::<u32>::zeros(cost.dim());
        let ordered = |len: usize, step: i64| -> Vec<usize> {
            if step >= 0 {
                (0..len).collect()
            }
            else {
                (0..len).rev().collect()
            }
        };
        let (rows, cols) = (ordered(height, drow), ordered(width, dcol));
        for &y in &rows {
            for &x in &cols {
                let (py, px) = (y as i64 - drow, x as i64 - dcol);
                if py < 0 || py >= height as i64 || px < 0 || px >= width as i64 {
                    for d in 0..num_disp {
                        path[[y, x, d]] = cost[[y, x, d]];
                    }
                    continue;
                }
                let (py, px) = (py as usize, px as usize);
                let jump = if params.adaptive_p2 {
                    let here = guide.get_pixel(x as u32, y as u32)[0] as i32;
                    let there = guide.get_pixel(px as u32, py as u32)[0] as i32;
                    (p2 / (here - there).abs().max(1) as u32).max(p1)
                }
                else {
                    p2
                };
                let prev_min = (0..num_disp).map(|k| path[[py, px, k]]).min().unwrap();
                for d in 0..num_disp {
                    let mut best = path[[py, px, d]].min(prev_min + jump);
                    if d > 0 {
                        best = best.min(path[[py, px, d - 1]] + p1);
                    }
                    if d + 1 < num_disp {
                        best = best.min(path[[py, px, d + 1]] + p1);
                    }
                    path[[y, x, d]] = cost[[y, x, d]] + best - prev_min;
                }
            }
        }
        sum += &path;
    }
    sum
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn disparities_stay_in_range() {
    let (left, right) = shifted_pair(48, 32, 3, 1);
    let unrelated = noise(48, 32, 2);

    for &(min_disparity, num_disparities) in &[(-3, 16), (0, 8), (2, 5)] {
        let params = Params {
            min_disparity,
            num_disparities,
            uniqueness_ratio: 0,
            disp12_max_diff: -1,
            speckle_window_size: 0,
            ..params()
        };
        for right in &[&right, &unrelated] {
            let map = compute_disparity(&left, right, &params).unwrap();
            let lo = min_disparity as f32;
            let hi = (min_disparity + num_disparities) as f32;
            for &d in map.as_array().iter().filter(|&&d| d != INVALID_DISPARITY) {
                assert!(d >= lo && d < hi, "{} outside {}..{}", d, lo, hi);
            }
        }
    }
}

#[test]
fn identical_images_prefer_zero_disparity() {
    let image = noise(40, 30, 3);
    let params = Params {
        min_disparity: -4,
        num_disparities: 12,
        ..params()
    };
    let cost = build_cost_volume(&image, &image, &params);
    let agg = aggregate_costs(&cost, &image, &params);
    let wta = winner_take_all(&agg);

    let zero_offset = (0 - params.min_disparity) as usize;
    for y in 5..25 {
        for x in 5..25 {
            assert_eq!(wta[[y, x]], zero_offset, "at ({}, {})", x, y);
        }
    }
}

#[test]
fn recovers_uniform_shift() {
    let shift = 6;
    let (left, right) = shifted_pair(64, 48, shift, 4);
    let params = params();
    let map = compute_disparity(&left, &right, &params).unwrap();

    let margin = params.block_size as usize;
    for y in margin..48 - margin {
        for x in shift as usize + 2 * margin..64 - margin {
            assert!(map.is_valid(x, y), "({}, {}) invalid", x, y);
            assert!(
                (map.get(x, y) - shift as f32).abs() <= 1.0,
                "({}, {}) = {}",
                x,
                y,
                map.get(x, y)
            );
        }
    }
}

#[test]
fn recovers_shift_with_every_option() {
    let shift = 4;
    let (left, right) = shifted_pair(56, 40, shift, 5);
    let variants = vec![
        Params { directions: Directions::Four, ..params() },
        Params { cost_function: CostFunction::AbsoluteDifference, ..params() },
        Params { adaptive_p2: true, ..params() },
        Params { pre_filter_cap: 31, ..params() },
    ];

    for params in variants {
        let map = compute_disparity(&left, &right, &params).unwrap();
        for y in 10..30 {
            for x in 20..46 {
                assert!(map.is_valid(x, y), "{:?}: ({}, {}) invalid", params, x, y);
                assert!((map.get(x, y) - shift as f32).abs() <= 1.0, "{:?}", params);
            }
        }
    }
}

#[test]
fn larger_p2_is_never_rougher() {
    let left = noise(48, 32, 6);
    let right = noise(48, 32, 7);
    let base = Params {
        block_size: 3,
        p1: 10,
        p2: 10,
        uniqueness_ratio: 0,
        disp12_max_diff: -1,
        speckle_window_size: 0,
        ..params()
    };

    let mut previous = usize::MAX;
    for &p2 in &[10, 500, 50000] {
        let map = compute_disparity(&left, &right, &Params { p2, ..base.clone() }).unwrap();
        let rough = jumps(&map);
        assert!(rough <= previous, "p2 {} gave {} jumps, previously {}", p2, rough, previous);
        previous = rough;
    }
}

#[test]
fn left_right_check_only_removes_pixels() {
    let (left, right) = shifted_pair(64, 40, 5, 8);
    let mut rng = Pcg64::seed_from_u64(9);
    let mut right = right;
    for pixel in right.pixels_mut() {
        let jitter: i16 = rng.gen_range(-40..=40);
        pixel[0] = (pixel[0] as i16 + jitter).max(0).min(255) as u8;
    }
    // An occluding patch only the right camera sees.
    for y in 10..25 {
        for x in 20..32 {
            right.put_pixel(x, y, Luma([rng.gen()]));
        }
    }

    let disabled = Params { disp12_max_diff: -1, ..params() };
    let strict = Params { disp12_max_diff: 0, ..params() };

    let open = compute_disparity(&left, &right, &disabled).unwrap();
    let checked = compute_disparity(&left, &right, &strict).unwrap();
    assert!(checked.valid_count() <= open.valid_count());
    for y in 0..40 {
        for x in 0..64 {
            if checked.is_valid(x, y) {
                assert!(open.is_valid(x, y));
            }
        }
    }
}

#[test]
fn speckles_are_removed_and_regions_kept() {
    let mut map = DisparityMap::new(8, 6);
    // A 12 pixel plateau with a little slope.
    for y in 0..3 {
        for x in 0..4 {
            map.put(x, y, 10.0 + 0.5 * x as f32);
        }
    }
    // A 4 pixel island far from the plateau.
    for y in 4..6 {
        for x in 6..8 {
            map.put(x, y, 30.0);
        }
    }
    // A 2 pixel spike touching the plateau but out of range.
    map.put(4, 0, 25.0);
    map.put(5, 0, 25.0);

    let before = map.clone();
    filter_speckles(&mut map, 5, 1.0);

    for y in 0..3 {
        for x in 0..4 {
            assert_eq!(map.get(x, y), before.get(x, y));
        }
    }
    assert_eq!(map.valid_count(), 12);
}

#[test]
fn constant_map_normalises_without_failing() {
    let mut map = DisparityMap::new(6, 4);
    for y in 0..2 {
        for x in 0..6 {
            map.put(x, y, 12.5);
        }
    }
    let levels = map.to_luma_normalised();
    let valid_levels: Vec<u8> = (0..2)
        .flat_map(|y| (0..6).map(move |x| (x, y)))
        .map(|(x, y)| levels.get_pixel(x, y)[0])
        .collect();
    assert!(valid_levels.iter().all(|&l| l == valid_levels[0]));
    assert_ne!(valid_levels[0], levels.get_pixel(0, 3)[0]);

    let color = map.to_color(ColorMap::Jet);
    assert_eq!(color.dimensions(), (6, 4));
}

#[test]
fn unmatchable_pair_gives_empty_map() {
    let image = noise(10, 8, 10);
    let params = Params {
        min_disparity: 20,
        ..params()
    };
    let map = compute_disparity(&image, &image, &params).unwrap();
    assert!(map.is_degenerate());
    assert!(map.to_luma_normalised().pixels().all(|p| p[0] == 0));
}

#[test]
fn rejects_invalid_input() {
    let image = noise(16, 12, 11);
    let narrow = noise(15, 12, 11);
    let empty = GrayImage::new(0, 12);

    let err = compute_disparity(&image, &narrow, &params()).unwrap_err();
    assert_eq!(err.field(), "right");

    let err = compute_disparity(&empty, &empty, &params()).unwrap_err();
    assert_eq!(err.field(), "left");

    let cases = vec![
        (Params { num_disparities: 0, ..params() }, "num_disparities"),
        (Params { block_size: 6, ..params() }, "block_size"),
        (Params { p1: 100, p2: 50, ..params() }, "p2"),
        (Params { uniqueness_ratio: -5, ..params() }, "uniqueness_ratio"),
    ];
    for (params, field) in cases {
        assert_eq!(compute_disparity(&image, &image, &params).unwrap_err().field(), field);
        assert!(SemiGlobal::new(params).is_err());
    }
}

#[test]
fn trait_and_function_agree() {
    let (left, right) = shifted_pair(32, 24, 2, 12);
    let mut matcher = SemiGlobal::new(params()).unwrap();
    let via_trait = matcher.compute(&StereoFrame::new(&left, &right)).unwrap();
    let via_fn = compute_disparity(&left, &right, &params()).unwrap();
    assert_eq!(via_trait, via_fn);
}

#[test]
fn cost_volume_matches_direct_window_sums() {
    let (left, right) = shifted_pair(23, 17, 3, 13);
    let params = Params {
        min_disparity: -2,
        num_disparities: 9,
        block_size: 3,
        cost_function: CostFunction::AbsoluteDifference,
        ..params()
    };
    let volume = build_cost_volume(&left, &right, &params);
    assert_eq!(volume.view(), direct_window_costs(&left, &right, &params).view());
}

#[test]
fn aggregation_matches_direct_path_walk() {
    let mut rng = Pcg64::seed_from_u64(14);
    let guide = noise(19, 13, 15);
    let data = Array3::from_shape_fn((13, 19, 7), |_| rng.gen_range(0..60u32));
    let volume = CostVolume::from_array(data.clone(), 0, 60);

    for &directions in &[Directions::Four, Directions::Eight] {
        for &adaptive_p2 in &[false, true] {
            let params = Params {
                num_disparities: 7,
                p1: 3,
                p2: 40,
                directions,
                adaptive_p2,
                ..params()
            };
            let agg = aggregate_costs(&volume, &guide, &params);
            assert_eq!(
                agg.view(),
                direct_aggregation(&data, &guide, &params).view(),
                "{:?}, adaptive {}",
                directions,
                adaptive_p2
            );
        }
    }
}
