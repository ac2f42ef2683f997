//! # Semi-global path aggregation
//!
//! This module sums smoothness-penalised 1-D path costs over the cost volume. Each path is a
//! single forward sweep keeping only the previous pixel (horizontal paths) or the previous row
//! (vertical and diagonal paths), so the only full-size buffer is the aggregated volume itself.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use log::*;
use ndarray::{
    Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1, ArrayViewMut2, Axis
};

use crate::cost::CostVolume;
use crate::params::{Directions, Params};

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Sum of the path costs over all directions, shaped like the [`CostVolume`].
#[derive(Debug, Clone)]
pub struct AggregatedCostVolume {
    /// Indexed by `[row, column, offset]`.
    data: Array3<u32>,
    min_disparity: i32
}

/// Step between consecutive pixels of a path.
struct ScanLine {
    drow: isize,
    dcol: isize
}

/// Smoothness penalties.
#[derive(Debug, Clone, Copy)]
struct Penalties {
    p1: u32,
    p2: u32,
    adaptive: bool
}

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

static PATHS: [ScanLine; 8] = [
    ScanLine { drow: 0, dcol: 1 },
    ScanLine { drow: 0, dcol: -1 },
    ScanLine { drow: 1, dcol: 0 },
    ScanLine { drow: -1, dcol: 0 },
    ScanLine { drow: 1, dcol: 1 },
    ScanLine { drow: 1, dcol: -1 },
    ScanLine { drow: -1, dcol: 1 },
    ScanLine { drow: -1, dcol: -1 }
];

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl AggregatedCostVolume {
    pub fn from_array(data: Array3<u32>, min_disparity: i32) -> Self {
        Self { data, min_disparity }
    }

    pub fn view(&self) -> ArrayView3<u32> {
        self.data.view()
    }

    /// Aggregated costs over all offsets for one pixel.
    pub fn costs(&self, x: usize, y: usize) -> ArrayView1<u32> {
        self.data.index_axis(Axis(0), y).index_axis_move(Axis(0), x)
    }

    /// Aggregated costs of one row, indexed by `[column, offset]`.
    pub fn row(&self, y: usize) -> ArrayView2<u32> {
        self.data.index_axis(Axis(0), y)
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
}

impl Penalties {
    /// Large-jump penalty between pixel `at` and its predecessor `from` on the path.
    ///
    /// The guide is only sampled for the adaptive penalty.
    fn p2(&self, guide: &GrayImage, at: (usize, usize), from: (usize, usize)) -> u32 {
        if !self.adaptive {
            return self.p2;
        }
        let here = guide.get_pixel(at.0 as u32, at.1 as u32)[0] as i32;
        let there = guide.get_pixel(from.0 as u32, from.1 as u32)[0] as i32;
        let gradient = (here - there).abs().max(1) as u32;
        (self.p2 / gradient).max(self.p1)
    }
}

/// Aggregate the cost volume along every path selected in `params`.
///
/// `guide` is the left image, only read when `params.adaptive_p2` is set, in which case it must
/// have the dimensions of the cost volume.
pub fn aggregate_costs(
    cost: &CostVolume,
    guide: &GrayImage,
    params: &Params
) -> AggregatedCostVolume {
    let (height, width, num_disp) = (cost.height(), cost.width(), cost.num_disparities());
    let penalties = Penalties {
        p1: params.p1.max(0) as u32,
        p2: params.p2.max(0) as u32,
        adaptive: params.adaptive_p2
    };

    let paths = match params.directions {
        Directions::Four => &PATHS[..4],
        Directions::Eight => &PATHS[..]
    };

    let mut sum = Array3::<u32>::zeros((height, width, num_disp));

    // Horizontal paths of a row depend on nothing outside it.
    let horizontal: Vec<isize> = paths
        .iter()
        .filter(|path| path.drow == 0)
        .map(|path| path.dcol)
        .collect();
    let sweep_row = |y: usize, sum_row: ArrayViewMut2<u32>| {
        horizontal_paths(
            cost.view().index_axis_move(Axis(0), y),
            sum_row,
            guide,
            y,
            &horizontal,
            penalties
        );
    };

    #[cfg(not(feature = "rayon"))]
    sum.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(y, sum_row)| sweep_row(y, sum_row));
    #[cfg(feature = "rayon")]
    sum.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, sum_row)| sweep_row(y, sum_row));

    trace!("Horizontal paths aggregated.");

    for path in paths.iter().filter(|path| path.drow != 0) {
        row_path(cost, &mut sum, guide, path, penalties);
        trace!("Path ({}, {}) aggregated.", path.drow, path.dcol);
    }

    debug!(
        "Aggregated {} paths over {}x{}x{} costs",
        paths.len(), height, width, num_disp
    );

    AggregatedCostVolume {
        data: sum,
        min_disparity: cost.min_disparity()
    }
}

/// Run the left-right and/or right-left paths of a single row, accumulating into `sum_row`.
fn horizontal_paths(
    cost_row: ArrayView2<u32>,
    mut sum_row: ArrayViewMut2<u32>,
    guide: &GrayImage,
    y: usize,
    dcols: &[isize],
    penalties: Penalties
) {
    let (width, num_disp) = cost_row.dim();
    let mut prev = Array1::<u32>::zeros(num_disp);
    let mut cur = Array1::<u32>::zeros(num_disp);

    for &dcol in dcols {
        let columns: Box<dyn Iterator<Item = usize>> = if dcol > 0 {
            Box::new(0..width)
        }
        else {
            Box::new((0..width).rev())
        };

        let mut last: Option<(usize, u32)> = None;
        for x in columns {
            let min = match last {
                None => start_path(cost_row.row(x), cur.view_mut()),
                Some((px, prev_min)) => {
                    let p2 = penalties.p2(guide, (x, y), (px, y));
                    path_step(
                        cost_row.row(x),
                        prev.view(),
                        prev_min,
                        penalties.p1,
                        p2,
                        cur.view_mut()
                    )
                }
            };
            let mut sum_cell = sum_row.row_mut(x);
            sum_cell += &cur;
            std::mem::swap(&mut prev, &mut cur);
            last = Some((x, min));
        }
    }
}

/// Run a path with a vertical component, one row at a time.
///
/// Every column of a row only depends on the previous row, so columns are updated together.
fn row_path(
    cost: &CostVolume,
    sum: &mut Array3<u32>,
    guide: &GrayImage,
    path: &ScanLine,
    penalties: Penalties
) {
    let (height, width, num_disp) = (cost.height(), cost.width(), cost.num_disparities());
    let costs = cost.view();

    let rows: Box<dyn Iterator<Item = usize>> = if path.drow > 0 {
        Box::new(0..height)
    }
    else {
        Box::new((0..height).rev())
    };

    let mut prev = Array2::<u32>::zeros((width, num_disp));
    let mut cur = Array2::<u32>::zeros((width, num_disp));
    let mut prev_min = vec![0u32; width];
    let mut prev_y: Option<usize> = None;

    for y in rows {
        let cost_row = costs.index_axis(Axis(0), y);

        let step = |(x, out): (usize, ArrayViewMut1<u32>)| -> u32 {
            let xp = x as isize - path.dcol;
            match prev_y {
                Some(py) if xp >= 0 && (xp as usize) < width => {
                    let xp = xp as usize;
                    let p2 = penalties.p2(guide, (x, y), (xp, py));
                    path_step(
                        cost_row.row(x),
                        prev.row(xp),
                        prev_min[xp],
                        penalties.p1,
                        p2,
                        out
                    )
                }
                _ => start_path(cost_row.row(x), out)
            }
        };

        #[cfg(not(feature = "rayon"))]
        let cur_min: Vec<u32> = cur.axis_iter_mut(Axis(0)).enumerate().map(step).collect();
        #[cfg(feature = "rayon")]
        let cur_min: Vec<u32> = cur
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .map(step)
            .collect();

        let mut sum_row = sum.index_axis_mut(Axis(0), y);
        sum_row += &cur;

        std::mem::swap(&mut prev, &mut cur);
        prev_min = cur_min;
        prev_y = Some(y);
    }
}

/// First pixel of a path: its path cost is the raw cost.
fn start_path(cost: ArrayView1<u32>, mut out: ArrayViewMut1<u32>) -> u32 {
    out.assign(&cost);
    cost.iter().copied().min().unwrap_or(0)
}

/// One step of the path recurrence
///
/// `L(p, d) = C(p, d) + min(L(p-r, d), L(p-r, d±1) + P1, min_k L(p-r, k) + P2) - min_k L(p-r, k)`
///
/// Writes `L(p, ..)` into `out` and returns its minimum.
fn path_step(
    cost: ArrayView1<u32>,
    prev: ArrayView1<u32>,
    prev_min: u32,
    p1: u32,
    p2: u32,
    mut out: ArrayViewMut1<u32>
) -> u32 {
    let num_disp = cost.len();
    let jump = prev_min + p2;
    let mut min = u32::MAX;

    for d in 0..num_disp {
        let mut best = prev[d].min(jump);
        if d > 0 {
            best = best.min(prev[d - 1] + p1);
        }
        if d + 1 < num_disp {
            best = best.min(prev[d + 1] + p1);
        }

        // best >= prev_min, so the path cost never exceeds C + P2.
        let val = cost[d] + best - prev_min;
        out[d] = val;
        min = min.min(val);
    }

    min
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
