//! # Semi-global block matching
//!
//! This module drives the full matcher: window costs, path aggregation, winner selection with
//! uniqueness and left-right checks, then speckle filtering. It follows Hirschmüller's
//! ("Stereo Processing by Semiglobal Matching and Mutual Information")[https://doi.org/10.1109/TPAMI.2007.1166]
//! with block matching costs in place of mutual information.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;
use log::*;

use crate::aggregate::aggregate_costs;
use crate::cost::build_cost_volume;
use crate::disparity::{DisparityAlgorithm, DisparityMap, StereoFrame};
use crate::error::*;
use crate::params::Params;
use crate::select::select_disparities;
use crate::speckle::filter_speckles;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A semi-global block matcher with validated parameters.
#[derive(Debug, Clone)]
pub struct SemiGlobal {
    params: Params
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SemiGlobal {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Compute the disparity map of a left/right grayscale pair.
    pub fn match_pair(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap> {
        let params = &self.params;
        params.validate_pair(left, right)?;

        info!(
            "Matching {}x{} pair over disparities {}..{}",
            left.width(),
            left.height(),
            params.min_disparity,
            params.min_disparity + params.num_disparities
        );

        // ---- MATCHING COST ----
        let cost = build_cost_volume(left, right, params);
        trace!("Cost volume built.");

        // ---- AGGREGATION ----
        let aggregated = aggregate_costs(&cost, left, params);
        drop(cost);
        trace!("Path aggregation finished.");

        // ---- SELECTION ----
        let mut disp_map = select_disparities(&aggregated, params);
        drop(aggregated);
        trace!("Disparity selection finished.");

        // ---- POST FILTER ----
        let removed = filter_speckles(
            &mut disp_map,
            params.speckle_window_size,
            params.speckle_range as f32
        );
        trace!("Speckle filtering finished, {} pixels removed.", removed);

        if disp_map.is_degenerate() {
            warn!("Every pixel was invalidated, returning an empty disparity map");
        }
        else {
            debug!(
                "{} of {} pixels hold a disparity",
                disp_map.valid_count(),
                disp_map.width() * disp_map.height()
            );
        }

        Ok(disp_map)
    }
}

impl DisparityAlgorithm for SemiGlobal {
    /// Compute the disparity map for the given frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap> {
        self.match_pair(frame.left, frame.right)
    }
}

/// Compute the disparity map of a rectified grayscale pair.
///
/// Invalid pixels hold [`INVALID_DISPARITY`](crate::INVALID_DISPARITY).
pub fn compute_disparity(
    left: &GrayImage,
    right: &GrayImage,
    params: &Params
) -> Result<DisparityMap> {
    SemiGlobal::new(params.clone())?.match_pair(left, right)
}
