//! # Disparity Computation
//!
//! This crate provides dense disparity map computation for rectified stereo pairs using
//! semi-global block matching.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod aggregate;
pub mod cost;
mod disparity;
mod error;
pub mod normalize;
pub mod params;
pub mod select;
pub mod sgbm;
pub mod speckle;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use crate::disparity::{is_valid, INVALID_DISPARITY};
pub use crate::error::{Error, Result};
pub use crate::sgbm::compute_disparity;

pub mod prelude {
    pub use crate::disparity::{DisparityAlgorithm, DisparityMap, StereoFrame, INVALID_DISPARITY};
    pub use crate::normalize::ColorMap;
    pub use crate::params::{CostFunction, Directions, Params};
    pub use crate::sgbm::{compute_disparity, SemiGlobal};
}
