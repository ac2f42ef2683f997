//! # Matching cost volume
//!
//! This module builds the per-pixel, per-disparity window dissimilarity that the path aggregation
//! works on.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::borrow::Cow;

use image::{GrayImage, Luma};
use ndarray::{Array3, ArrayView1, ArrayView3, ArrayViewMut2, Axis};

use crate::params::{CostFunction, Params};

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Window matching cost for every pixel and disparity offset.
///
/// Offset `d` stands for the true disparity `min_disparity + d`.
#[derive(Debug, Clone)]
pub struct CostVolume {
    /// Indexed by `[row, column, offset]`.
    data: Array3<u32>,
    min_disparity: i32,
    max_cost: u32
}

/// Image samples prepared for the per-pixel cost, in doubled intensity units.
///
/// `lo` and `hi` bound the values the sample may take when shifted by up to half a pixel. For
/// absolute differences they equal the sample itself.
struct Samples {
    width: usize,
    value: Vec<i32>,
    lo: Vec<i32>,
    hi: Vec<i32>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CostVolume {
    pub fn from_array(data: Array3<u32>, min_disparity: i32, max_cost: u32) -> Self {
        Self { data, min_disparity, max_cost }
    }

    pub fn view(&self) -> ArrayView3<u32> {
        self.data.view()
    }

    /// Costs over all offsets for one pixel.
    pub fn costs(&self, x: usize, y: usize) -> ArrayView1<u32> {
        self.data.index_axis(Axis(0), y).index_axis_move(Axis(0), x)
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn num_disparities(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn min_disparity(&self) -> i32 {
        self.min_disparity
    }

    /// Cost of a whole window of worst matches, given to out-of-image matches.
    pub fn max_cost(&self) -> u32 {
        self.max_cost
    }
}

impl Samples {
    fn new(image: &GrayImage, cost_function: CostFunction) -> Self {
        let width = image.width() as usize;
        let raw = image.as_raw();
        let value: Vec<i32> = raw.iter().map(|&v| 2 * v as i32).collect();

        let (lo, hi) = match cost_function {
            CostFunction::AbsoluteDifference => (value.clone(), value.clone()),
            CostFunction::BirchfieldTomasi => {
                let mut lo = Vec::with_capacity(raw.len());
                let mut hi = Vec::with_capacity(raw.len());
                for row in raw.chunks(width) {
                    for x in 0..width {
                        let centre = row[x] as i32;
                        let prev = row[x.saturating_sub(1)] as i32;
                        let next = row[(x + 1).min(width - 1)] as i32;
                        let (minus, plus) = (centre + prev, centre + next);
                        lo.push((2 * centre).min(minus).min(plus));
                        hi.push((2 * centre).max(minus).max(plus));
                    }
                }
                (lo, hi)
            }
        };

        Self { width, value, lo, hi }
    }

    /// Symmetric range distance between a left and a right sample, in intensity units.
    fn cost(&self, other: &Samples, y: usize, xl: usize, xr: usize) -> u32 {
        let l = y * self.width + xl;
        let r = y * other.width + xr;
        let (vl, vr) = (self.value[l], other.value[r]);
        let to_right = (vl - other.hi[r]).max(other.lo[r] - vl).max(0);
        let to_left = (vr - self.hi[l]).max(self.lo[l] - vr).max(0);
        ((to_right.min(to_left) + 1) / 2) as u32
    }
}

/// Replace an image by its horizontal Sobel response clipped to `[-cap, cap]` and offset by `cap`.
pub fn pre_filter(image: &GrayImage, cap: u8) -> GrayImage {
    let sobel = imageproc::gradients::horizontal_sobel(image);
    let cap = cap as i16;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let response = sobel.get_pixel(x, y)[0];
        Luma([(response.max(-cap).min(cap) + cap) as u8])
    })
}

/// Build the matching cost volume of a validated stereo pair.
///
/// Both images must be non-empty and of equal size, see [`Params::validate_pair`].
pub fn build_cost_volume(left: &GrayImage, right: &GrayImage, params: &Params) -> CostVolume {
    let (left, right): (Cow<GrayImage>, Cow<GrayImage>) = if params.pre_filter_cap > 0 {
        (
            Cow::Owned(pre_filter(left, params.pre_filter_cap)),
            Cow::Owned(pre_filter(right, params.pre_filter_cap))
        )
    }
    else {
        (Cow::Borrowed(left), Cow::Borrowed(right))
    };

    let width = left.width() as usize;
    let height = left.height() as usize;
    let num_disp = params.disparity_count();

    let left = Samples::new(&left, params.cost_function);
    let right = Samples::new(&right, params.cost_function);

    let mut data = Array3::<u32>::zeros((height, width, num_disp));

    let fill_row = |y: usize, row: ArrayViewMut2<u32>| {
        build_row(&left, &right, height, y, params, row);
    };

    #[cfg(not(feature = "rayon"))]
    data.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(y, row)| fill_row(y, row));
    #[cfg(feature = "rayon")]
    data.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, row)| fill_row(y, row));

    CostVolume {
        data,
        min_disparity: params.min_disparity,
        max_cost: params.max_window_cost()
    }
}

/// Fill the `[column, offset]` costs of row `y`.
fn build_row(
    left: &Samples,
    right: &Samples,
    height: usize,
    y: usize,
    params: &Params,
    mut out: ArrayViewMut2<u32>
) {
    let width = left.width;
    let radius = params.block_radius() as isize;
    let max_pixel = params.max_pixel_cost();
    let max_window = params.max_window_cost();

    let clamp = |v: isize, len: usize| v.max(0).min(len as isize - 1) as usize;
    let match_column = |x: usize, disp: i64| {
        let xr = x as i64 - disp;
        if xr >= 0 && xr < width as i64 {
            Some(xr as usize)
        }
        else {
            None
        }
    };

    let mut column_sums = vec![0u32; width];

    for d in 0..params.disparity_count() {
        let disp = params.min_disparity as i64 + d as i64;

        // Vertical window sums, rows replicated past the border
        for (x, sum) in column_sums.iter_mut().enumerate() {
            *sum = match match_column(x, disp) {
                Some(xr) => (-radius..=radius)
                    .map(|dy| left.cost(right, clamp(y as isize + dy, height), x, xr))
                    .sum(),
                None => max_pixel * (2 * radius as u32 + 1)
            };
        }

        for x in 0..width {
            out[[x, d]] = match match_column(x, disp) {
                Some(_) => (-radius..=radius)
                    .map(|dx| column_sums[clamp(x as isize + dx, width)])
                    .sum(),
                None => max_window
            };
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
