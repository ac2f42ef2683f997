//! # General disparity objects
//!
//! This module provides the disparity map, the stereo frame it is computed from, and the trait
//! implemented by disparity algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, RgbImage};
use ndarray::Array2;

use crate::error::*;
use crate::normalize::{self, ColorMap};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Value stored for pixels without a reliable disparity.
///
/// No finite disparity can collide with it, so it is independent of the disparity range.
pub const INVALID_DISPARITY: f32 = f32::NEG_INFINITY;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A floating point disparity map.
///
/// Each pixel holds the true disparity (sub-pixel where refined) or [`INVALID_DISPARITY`].
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    /// Indexed by `[row, column]`.
    data: Array2<f32>
}

/// A rectified grayscale stereo pair, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct StereoFrame<'a> {
    pub left: &'a GrayImage,
    pub right: &'a GrayImage
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<'a> StereoFrame<'a> {
    pub fn new(left: &'a GrayImage, right: &'a GrayImage) -> Self {
        Self { left, right }
    }

    pub fn width(&self) -> u32 {
        self.left.width()
    }

    pub fn height(&self) -> u32 {
        self.left.height()
    }
}

impl DisparityMap {
    /// Create a map where every pixel is invalid.
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: Array2::from_elem((height, width), INVALID_DISPARITY)
        }
    }

    /// Wrap a `[row, column]` array of disparities.
    pub fn from_array(data: Array2<f32>) -> Self {
        DisparityMap { data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[[y, x]]
    }

    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data[[y, x]] = val;
    }

    pub fn invalidate(&mut self, x: usize, y: usize) {
        self.data[[y, x]] = INVALID_DISPARITY;
    }

    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        is_valid(self.data[[y, x]])
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array2<f32> {
        &mut self.data
    }

    /// Number of pixels holding a disparity.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&d| is_valid(d)).count()
    }

    /// True when no pixel holds a disparity.
    pub fn is_degenerate(&self) -> bool {
        self.valid_count() == 0
    }

    /// Smallest and largest valid disparity, if any pixel is valid.
    pub fn valid_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|&d| is_valid(d))
            .fold(None, |range, d| match range {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d)))
            })
    }

    /// Converts the map into a Luma8 image, clamping raw disparities to `0..=255`.
    ///
    /// Invalid pixels become 0.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let val = self.get(x as usize, y as usize);
            if is_valid(val) {
                image::Luma([val.max(0.0).min(255.0) as u8])
            }
            else {
                image::Luma([0])
            }
        })
    }

    /// Converts the map to a GrayImage stretched over the observed valid disparity range.
    pub fn to_luma_normalised(&self) -> GrayImage {
        normalize::normalize(self)
    }

    /// Converts the map to a normalised image coloured through the given palette.
    pub fn to_color(&self, color_map: ColorMap) -> RgbImage {
        normalize::colorize(&self.to_luma_normalised(), color_map)
    }
}

/// Check whether a stored disparity is a real value rather than the sentinel.
pub fn is_valid(disparity: f32) -> bool {
    disparity != INVALID_DISPARITY
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_degenerate() {
        let map = DisparityMap::new(4, 3);
        assert_eq!(map.width(), 4);
        assert_eq!(map.height(), 3);
        assert!(map.is_degenerate());
        assert_eq!(map.valid_range(), None);
    }

    #[test]
    fn range_skips_invalid_pixels() {
        let mut map = DisparityMap::new(3, 1);
        map.put(0, 0, 4.5);
        map.put(2, 0, -2.0);
        assert_eq!(map.valid_count(), 2);
        assert_eq!(map.valid_range(), Some((-2.0, 4.5)));

        map.invalidate(2, 0);
        assert!(!map.is_valid(2, 0));
        assert_eq!(map.valid_range(), Some((4.5, 4.5)));
    }

    #[test]
    fn luma_clamps_raw_values() {
        let mut map = DisparityMap::new(3, 1);
        map.put(0, 0, 300.0);
        map.put(1, 0, -3.0);
        let luma = map.to_luma();
        assert_eq!(luma.get_pixel(0, 0)[0], 255);
        assert_eq!(luma.get_pixel(1, 0)[0], 0);
        assert_eq!(luma.get_pixel(2, 0)[0], 0);
    }
}
