//! # Disparity selection
//!
//! This module picks the winning disparity of every pixel from the aggregated costs, rejects
//! ambiguous and inconsistent winners, and refines the rest to sub-pixel precision.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::*;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

use crate::aggregate::AggregatedCostVolume;
use crate::disparity::{DisparityMap, INVALID_DISPARITY};
use crate::params::Params;

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Number of pixels rejected by each check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rejections {
    /// Winning match lies outside the right image.
    pub out_of_image: usize,
    /// Runner-up cost too close to the winner.
    pub ambiguous: usize,
    /// Left and right based disparities disagree.
    pub inconsistent: usize
}

/// Checks applied to each winner.
#[derive(Debug, Clone, Copy)]
struct Checks {
    min_disparity: i64,
    uniqueness_ratio: u64,
    lr_tolerance: Option<u32>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Rejections {
    pub fn total(&self) -> usize {
        self.out_of_image + self.ambiguous + self.inconsistent
    }

    fn merge(self, other: Self) -> Self {
        Self {
            out_of_image: self.out_of_image + other.out_of_image,
            ambiguous: self.ambiguous + other.ambiguous,
            inconsistent: self.inconsistent + other.inconsistent
        }
    }
}

/// Offset with the lowest aggregated cost for every pixel, ties going to the smallest offset.
///
/// Indexed by `[row, column]`.
pub fn winner_take_all(agg: &AggregatedCostVolume) -> Array2<usize> {
    Array2::from_shape_fn((agg.height(), agg.width()), |(y, x)| {
        best_offset(agg.costs(x, y)).0
    })
}

/// Select, validate and refine the disparity of every pixel.
pub fn select_disparities(agg: &AggregatedCostVolume, params: &Params) -> DisparityMap {
    let (map, rejections) = select_with_rejections(agg, params);
    debug!(
        "Rejected {} pixels: {} out of image, {} ambiguous, {} inconsistent",
        rejections.total(),
        rejections.out_of_image,
        rejections.ambiguous,
        rejections.inconsistent
    );
    map
}

/// As [`select_disparities`], also reporting how many pixels each check rejected.
pub fn select_with_rejections(
    agg: &AggregatedCostVolume,
    params: &Params
) -> (DisparityMap, Rejections) {
    let checks = Checks {
        min_disparity: agg.min_disparity() as i64,
        uniqueness_ratio: params.uniqueness_ratio.max(0) as u64,
        lr_tolerance: params.lr_tolerance()
    };

    let mut data = Array2::from_elem((agg.height(), agg.width()), INVALID_DISPARITY);

    let per_row = |(y, out): (usize, ArrayViewMut1<f32>)| -> Rejections {
        select_row(agg.row(y), checks, out)
    };

    #[cfg(not(feature = "rayon"))]
    let rejections = data
        .axis_iter_mut(Axis(0))
        .enumerate()
        .map(per_row)
        .fold(Rejections::default(), Rejections::merge);
    #[cfg(feature = "rayon")]
    let rejections = data
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .map(per_row)
        .reduce(Rejections::default, Rejections::merge);

    (DisparityMap::from_array(data), rejections)
}

fn select_row(costs: ArrayView2<u32>, checks: Checks, mut out: ArrayViewMut1<f32>) -> Rejections {
    let (width, num_disp) = costs.dim();
    let mut rejections = Rejections::default();

    let right = checks
        .lr_tolerance
        .map(|_| right_disparities(costs, checks.min_disparity));

    for x in 0..width {
        let pixel = costs.row(x);
        let (best, best_cost) = best_offset(pixel);
        let disp = checks.min_disparity + best as i64;

        let xr = x as i64 - disp;
        if xr < 0 || xr >= width as i64 {
            rejections.out_of_image += 1;
            continue;
        }

        if checks.uniqueness_ratio > 0 {
            let runner_up = pixel
                .iter()
                .enumerate()
                .filter(|&(d, _)| (d as i64 - best as i64).abs() > 1)
                .map(|(_, &c)| c)
                .min();
            if let Some(second) = runner_up {
                if (second as u64) * 100 < (best_cost as u64) * (100 + checks.uniqueness_ratio) {
                    rejections.ambiguous += 1;
                    continue;
                }
            }
        }

        if let (Some(tolerance), Some(right)) = (checks.lr_tolerance, &right) {
            let consistent = match right[xr as usize] {
                Some(right_disp) => (right_disp - disp).abs() <= tolerance as i64,
                None => false
            };
            if !consistent {
                rejections.inconsistent += 1;
                continue;
            }
        }

        let delta = if best > 0 && best + 1 < num_disp {
            sub_pixel_offset(pixel[best - 1], best_cost, pixel[best + 1])
        }
        else {
            0.0
        };

        out[x] = disp as f32 + delta;
    }

    rejections
}

/// Winning disparity of every right image column, computed from the left-based costs.
///
/// Right column `xr` sees left column `xr + disparity` at each offset. Columns with no candidate
/// left pixel are `None`.
fn right_disparities(costs: ArrayView2<u32>, min_disparity: i64) -> Vec<Option<i64>> {
    let (width, num_disp) = costs.dim();
    (0..width)
        .map(|xr| {
            (0..num_disp)
                .filter_map(|d| {
                    let xl = xr as i64 + min_disparity + d as i64;
                    if xl >= 0 && xl < width as i64 {
                        Some((costs[[xl as usize, d]], d))
                    }
                    else {
                        None
                    }
                })
                .min()
                .map(|(_, d)| min_disparity + d as i64)
        })
        .collect()
}

/// Lowest cost offset and its cost, ties going to the smallest offset.
fn best_offset(costs: ArrayView1<u32>) -> (usize, u32) {
    costs
        .iter()
        .enumerate()
        .fold((0, u32::MAX), |(best, best_cost), (d, &c)| {
            if c < best_cost {
                (d, c)
            }
            else {
                (best, best_cost)
            }
        })
}

/// Vertex of the parabola through the costs at `d-1`, `d` and `d+1`, relative to `d`.
fn sub_pixel_offset(left: u32, centre: u32, right: u32) -> f32 {
    let (left, centre, right) = (left as i64, centre as i64, right as i64);
    let denom = (left + right - 2 * centre).max(1);
    let delta = (left - right) as f32 / (2 * denom) as f32;
    delta.max(-1.0).min(1.0)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
