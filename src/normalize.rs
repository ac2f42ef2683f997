//! # Display normalisation
//!
//! This module stretches a disparity map over `0..=255` and colours it for display. Nothing here
//! changes the disparities themselves.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::disparity::{is_valid, DisparityMap};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Output value of invalid pixels.
pub const INVALID_LEVEL: u8 = 0;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// 256 entry palettes for normalised maps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColorMap {
    /// Dark blue through cyan, yellow and red to dark red.
    Jet,
    Gray
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl ColorMap {
    /// The RGB entry for every level.
    pub fn lut(&self) -> [[u8; 3]; 256] {
        let mut lut = [[0u8; 3]; 256];
        for (level, entry) in lut.iter_mut().enumerate() {
            *entry = match self {
                ColorMap::Jet => {
                    let v = level as f32 / 255.0;
                    let channel = |centre: f32| {
                        let c = (1.5 - (4.0 * v - centre).abs()).max(0.0).min(1.0);
                        (c * 255.0).round() as u8
                    };
                    [channel(3.0), channel(2.0), channel(1.0)]
                }
                ColorMap::Gray => [level as u8; 3]
            };
        }
        lut
    }
}

/// Stretch the valid disparities of a map linearly over `0..=255`.
///
/// The smallest valid disparity maps to 0 and the largest to 255; invalid pixels map to
/// [`INVALID_LEVEL`]. A map with a single distinct disparity has its range widened by one
/// below that value, so all its valid pixels map to 255. A map with no valid pixel maps to
/// all [`INVALID_LEVEL`].
pub fn normalize(map: &DisparityMap) -> GrayImage {
    let (width, height) = (map.width() as u32, map.height() as u32);

    let (lo, hi) = match map.valid_range() {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((_, hi)) => (hi - 1.0, hi),
        None => return GrayImage::from_pixel(width, height, Luma([INVALID_LEVEL]))
    };
    let scale = 255.0 / (hi - lo);

    GrayImage::from_fn(width, height, |x, y| {
        let val = map.get(x as usize, y as usize);
        if is_valid(val) {
            Luma([((val - lo) * scale).round().max(0.0).min(255.0) as u8])
        }
        else {
            Luma([INVALID_LEVEL])
        }
    })
}

/// Look every level of a normalised map up in a palette.
pub fn colorize(levels: &GrayImage, color_map: ColorMap) -> RgbImage {
    let lut = color_map.lut();
    imageproc::map::map_colors(levels, |level: Luma<u8>| Rgb(lut[level[0] as usize]))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretches_valid_range() {
        let mut map = DisparityMap::new(4, 1);
        map.put(0, 0, 10.0);
        map.put(1, 0, 20.0);
        map.put(2, 0, 15.0);
        let levels = normalize(&map);
        assert_eq!(levels.get_pixel(0, 0)[0], 0);
        assert_eq!(levels.get_pixel(1, 0)[0], 255);
        assert_eq!(levels.get_pixel(2, 0)[0], 128);
        assert_eq!(levels.get_pixel(3, 0)[0], INVALID_LEVEL);
    }

    #[test]
    fn constant_map_is_not_confused_with_invalid() {
        let mut map = DisparityMap::new(3, 2);
        for x in 0..3 {
            map.put(x, 0, 7.25);
        }
        let levels = normalize(&map);
        for x in 0..3 {
            assert_eq!(levels.get_pixel(x, 0)[0], 255);
            assert_eq!(levels.get_pixel(x, 1)[0], INVALID_LEVEL);
        }
    }

    #[test]
    fn empty_map_normalises_to_invalid() {
        let levels = normalize(&DisparityMap::new(5, 5));
        assert!(levels.pixels().all(|p| p[0] == INVALID_LEVEL));
    }

    #[test]
    fn jet_runs_blue_to_red() {
        let lut = ColorMap::Jet.lut();
        assert_eq!(lut[0], [0, 0, 128]);
        assert_eq!(lut[255], [128, 0, 0]);
        assert_eq!(lut[128][1], 255);
    }

    #[test]
    fn colorize_uses_palette() {
        let levels = GrayImage::from_fn(2, 1, |x, _| Luma([x as u8 * 255]));
        let rgb = colorize(&levels, ColorMap::Gray);
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 255, 255]));

        let rgb = colorize(&levels, ColorMap::Jet);
        assert_eq!(rgb.get_pixel(0, 0), &Rgb(ColorMap::Jet.lut()[0]));
    }
}
