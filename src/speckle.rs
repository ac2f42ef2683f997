//! # Speckle filtering
//!
//! This module invalidates small connected regions of similar disparity. Regions are labelled
//! with a union-find over pixel indices, so large uniform areas cost no recursion.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::*;

use crate::disparity::{is_valid, DisparityMap, INVALID_DISPARITY};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Disjoint sets over pixel indices, with union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len]
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            // Path halving
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

/// Invalidate every 4-connected region smaller than `window_size` pixels, in place.
///
/// Two valid neighbours belong to the same region when their disparities differ by at most
/// `range`. A `window_size` of 0 leaves the map untouched. Returns the number of pixels
/// invalidated.
pub fn filter_speckles(map: &mut DisparityMap, window_size: usize, range: f32) -> usize {
    if window_size == 0 {
        return 0;
    }

    let (width, height) = (map.width(), map.height());
    let data = map.as_array_mut();
    let mut sets = UnionFind::new(width * height);

    let connected = |a: f32, b: f32| is_valid(a) && is_valid(b) && (a - b).abs() <= range;

    for y in 0..height {
        for x in 0..width {
            let here = data[[y, x]];
            if !is_valid(here) {
                continue;
            }
            if x + 1 < width && connected(here, data[[y, x + 1]]) {
                sets.union(y * width + x, y * width + x + 1);
            }
            if y + 1 < height && connected(here, data[[y + 1, x]]) {
                sets.union(y * width + x, (y + 1) * width + x);
            }
        }
    }

    let mut removed = 0;
    let mut regions = 0;
    for y in 0..height {
        for x in 0..width {
            if !is_valid(data[[y, x]]) {
                continue;
            }
            let root = sets.find(y * width + x);
            if sets.size[root] < window_size {
                data[[y, x]] = INVALID_DISPARITY;
                removed += 1;
                if root == y * width + x {
                    regions += 1;
                }
            }
        }
    }

    debug!("Removed {} speckle regions covering {} pixels", regions, removed);

    removed
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
