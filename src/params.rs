//! # Matcher parameters
//!
//! This module provides the configuration bundle shared by every stage of the semi-global block
//! matcher, along with its validation.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Largest supported pre-filter cap.
pub const MAX_PRE_FILTER_CAP: u8 = 63;

/// Largest per-pixel cost on raw intensities.
const MAX_INTENSITY_COST: u32 = 255;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Set of 1-D paths costs are aggregated along.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Directions {
    /// Left-right, right-left, top-bottom and bottom-top.
    Four,
    /// The axis paths plus the four diagonals.
    Eight
}

/// Per-pixel matching cost.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostFunction {
    /// Absolute intensity difference.
    AbsoluteDifference,
    /// Birchfield-Tomasi sampling-insensitive dissimilarity: each pixel is compared against the
    /// range spanned by its counterpart and the half-way values to the counterpart's horizontal
    /// neighbours, symmetrically, and the smaller of the two distances is taken.
    BirchfieldTomasi
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Semi-global block matching parameters.
///
/// [`Params::default`] gives the settings of a typical 5x5 single channel matcher over 96
/// disparities.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Smallest disparity considered.
    pub min_disparity: i32,
    /// Number of disparities considered, starting at `min_disparity`.
    pub num_disparities: i32,
    /// Side of the square matching window, odd.
    pub block_size: i32,
    /// Penalty for a disparity change of one between neighbouring pixels.
    pub p1: i32,
    /// Penalty for a disparity change larger than one between neighbouring pixels.
    pub p2: i32,
    /// Maximum left-right disparity difference, negative to disable the check.
    pub disp12_max_diff: i32,
    /// Percent by which the best cost must beat the runner-up.
    pub uniqueness_ratio: i32,
    /// Minimum size of a connected disparity region, 0 to disable speckle filtering.
    pub speckle_window_size: usize,
    /// Maximum disparity difference between neighbours of the same region.
    pub speckle_range: i32,
    /// Clip for the Sobel pre-filter, 0 to match on raw intensities.
    pub pre_filter_cap: u8,
    pub directions: Directions,
    pub cost_function: CostFunction,
    /// Scale `p2` down across intensity edges.
    pub adaptive_p2: bool
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        let block_size = 5;
        Self {
            min_disparity: 0,
            num_disparities: 96,
            block_size,
            p1: 8 * 3 * block_size * block_size,
            p2: 32 * 3 * block_size * block_size,
            disp12_max_diff: 1,
            uniqueness_ratio: 10,
            speckle_window_size: 100,
            speckle_range: 32,
            pre_filter_cap: 0,
            directions: Directions::Eight,
            cost_function: CostFunction::BirchfieldTomasi,
            adaptive_p2: false
        }
    }
}

impl Params {
    /// Check the parameters on their own, failing on the first field out of range.
    pub fn validate(&self) -> Result<()> {
        if self.num_disparities <= 0 {
            return Err(Error::invalid(
                "num_disparities",
                format!("must be positive, got {}", self.num_disparities)
            ));
        }
        if self.min_disparity.checked_add(self.num_disparities).is_none() {
            return Err(Error::invalid(
                "min_disparity",
                "disparity range overflows"
            ));
        }
        if self.block_size < 1 || self.block_size % 2 == 0 {
            return Err(Error::invalid(
                "block_size",
                format!("must be odd and at least 1, got {}", self.block_size)
            ));
        }
        if self.p1 < 0 {
            return Err(Error::invalid(
                "p1",
                format!("must not be negative, got {}", self.p1)
            ));
        }
        if self.p2 < self.p1 {
            return Err(Error::invalid(
                "p2",
                format!("must be at least p1 ({}), got {}", self.p1, self.p2)
            ));
        }
        if self.uniqueness_ratio < 0 {
            return Err(Error::invalid(
                "uniqueness_ratio",
                format!("must not be negative, got {}", self.uniqueness_ratio)
            ));
        }
        if self.speckle_range < 0 {
            return Err(Error::invalid(
                "speckle_range",
                format!("must not be negative, got {}", self.speckle_range)
            ));
        }
        if self.pre_filter_cap > MAX_PRE_FILTER_CAP {
            return Err(Error::invalid(
                "pre_filter_cap",
                format!("must be at most {}, got {}", MAX_PRE_FILTER_CAP, self.pre_filter_cap)
            ));
        }

        // Every path cost stays below the window cost plus p2, so the sum over all paths must
        // fit the accumulator.
        let worst = (self.max_window_cost() as u64 + self.p2 as u64)
            * self.num_paths() as u64;
        if worst > u32::MAX as u64 {
            return Err(Error::invalid(
                "p2",
                format!("aggregated costs could reach {} and overflow", worst)
            ));
        }

        Ok(())
    }

    /// Check a stereo pair against the parameters.
    pub fn validate_pair(&self, left: &GrayImage, right: &GrayImage) -> Result<()> {
        if left.width() == 0 || left.height() == 0 {
            return Err(Error::invalid(
                "left",
                format!("image is empty ({}x{})", left.width(), left.height())
            ));
        }
        if left.dimensions() != right.dimensions() {
            return Err(Error::invalid(
                "right",
                format!(
                    "dimensions {}x{} differ from left {}x{}",
                    right.width(), right.height(), left.width(), left.height()
                )
            ));
        }
        self.validate()
    }

    /// Number of disparity offsets, as an index bound.
    pub fn disparity_count(&self) -> usize {
        self.num_disparities.max(0) as usize
    }

    /// Half width of the matching window.
    pub fn block_radius(&self) -> usize {
        (self.block_size.max(1) as usize - 1) / 2
    }

    /// Largest cost a single pixel comparison can produce.
    pub fn max_pixel_cost(&self) -> u32 {
        if self.pre_filter_cap > 0 {
            2 * self.pre_filter_cap as u32
        }
        else {
            MAX_INTENSITY_COST
        }
    }

    /// Largest cost a whole window can produce, also used for out-of-image matches.
    pub fn max_window_cost(&self) -> u32 {
        let side = self.block_size.max(1) as u64;
        (self.max_pixel_cost() as u64 * side * side).min(u32::MAX as u64) as u32
    }

    /// Number of aggregation paths.
    pub fn num_paths(&self) -> usize {
        match self.directions {
            Directions::Four => 4,
            Directions::Eight => 8
        }
    }

    /// The left-right tolerance, if the check is enabled.
    pub fn lr_tolerance(&self) -> Option<u32> {
        if self.disp12_max_diff < 0 {
            None
        }
        else {
            Some(self.disp12_max_diff as u32)
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
