//! Hex coordinate system using axial coordinates (q, r).
//!
//! This module provides the geometric foundation for the board generator:
//! - `HexCoord`: identifies individual hex tiles
//! - `Point`: a pixel-space position (tile centers, tile corners, nodes)
//!
//! Hexes are pointy-top. Corners are produced in pixel space and deduplicated
//! by the generator, so no canonical vertex/edge coordinate type is needed.

use serde::{Deserialize, Serialize};

/// A position in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Lookup key with both axes rounded to `decimals` places.
    ///
    /// Two corners computed from neighbouring tiles differ only by float noise,
    /// so they collapse onto the same key.
    pub fn rounded_key(&self, decimals: i32) -> (i64, i64) {
        let scale = 10f64.powi(decimals);
        (
            (self.x * scale).round() as i64,
            (self.y * scale).round() as i64,
        )
    }
}

/// Axial coordinate for hex grid.
///
/// In axial coordinates:
/// - `q` increases going east (right)
/// - `r` increases going southeast
/// - The third coordinate `s` (not stored) satisfies: q + r + s = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HexCoord {
    /// Column (increases going east)
    pub q: i32,
    /// Row (increases going southeast)
    pub r: i32,
}

impl HexCoord {
    /// Create a new hex coordinate
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// The six neighboring hexes in clockwise order starting from East
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            HexCoord::new(self.q + 1, self.r),     // East
            HexCoord::new(self.q + 1, self.r - 1), // NorthEast
            HexCoord::new(self.q, self.r - 1),     // NorthWest
            HexCoord::new(self.q - 1, self.r),     // West
            HexCoord::new(self.q - 1, self.r + 1), // SouthWest
            HexCoord::new(self.q, self.r + 1),     // SouthEast
        ]
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Distance from the origin
    pub fn length(&self) -> u32 {
        self.distance_to(&HexCoord::default())
    }

    /// All hexes within `radius` steps of the origin.
    ///
    /// Ordered by q, then r: for each q in [-radius, radius], r runs over
    /// max(-radius, -q-radius)..=min(radius, -q+radius).
    pub fn within(radius: u32) -> Vec<HexCoord> {
        let radius = radius as i32;
        let mut coords = Vec::new();
        for q in -radius..=radius {
            let r_min = (-radius).max(-q - radius);
            let r_max = radius.min(-q + radius);
            for r in r_min..=r_max {
                coords.push(HexCoord::new(q, r));
            }
        }
        coords
    }

    /// The hexes exactly `radius` steps from the origin, in the same order as [`HexCoord::within`]
    pub fn ring(radius: u32) -> Vec<HexCoord> {
        Self::within(radius)
            .into_iter()
            .filter(|h| h.length() == radius)
            .collect()
    }

    /// Convert to pixel coordinates (center of hex)
    /// Uses pointy-top orientation with the given hex size (radius)
    pub fn to_pixel(&self, hex_size: f64) -> Point {
        let x = hex_size * (3.0_f64.sqrt() * self.q as f64 + 3.0_f64.sqrt() / 2.0 * self.r as f64);
        let y = hex_size * (3.0 / 2.0 * self.r as f64);
        Point::new(x, y)
    }

    /// The six corners of this hex, pointy-top: corner i sits at 60°·i − 30°
    pub fn corners(&self, hex_size: f64) -> [Point; 6] {
        let center = self.to_pixel(hex_size);
        std::array::from_fn(|i| {
            let angle = (60.0 * i as f64 - 30.0).to_radians();
            Point::new(
                center.x + hex_size * angle.cos(),
                center.y + hex_size * angle.sin(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_neighbors() {
        let center = HexCoord::new(0, 0);
        let neighbors = center.neighbors();

        // Should have 6 unique neighbors
        let unique: HashSet<_> = neighbors.iter().collect();
        assert_eq!(unique.len(), 6);

        // Each neighbor should be distance 1 away
        for neighbor in &neighbors {
            assert_eq!(center.distance_to(neighbor), 1);
        }
    }

    #[test]
    fn test_hex_distance() {
        let a = HexCoord::new(0, 0);
        let b = HexCoord::new(2, -1);
        assert_eq!(a.distance_to(&b), 2);

        let c = HexCoord::new(-3, 3);
        assert_eq!(a.distance_to(&c), 3);
    }

    #[test]
    fn test_within_counts() {
        assert_eq!(HexCoord::within(0).len(), 1);
        assert_eq!(HexCoord::within(1).len(), 7);
        assert_eq!(HexCoord::within(2).len(), 19);
        assert_eq!(HexCoord::within(3).len(), 37);
    }

    #[test]
    fn test_within_enumeration_order() {
        let coords = HexCoord::within(1);
        assert_eq!(coords[0], HexCoord::new(-1, 0));
        assert_eq!(coords[1], HexCoord::new(-1, 1));
        assert_eq!(coords[2], HexCoord::new(0, -1));
        assert_eq!(coords[6], HexCoord::new(1, 0));
    }

    #[test]
    fn test_ring_sizes() {
        assert_eq!(HexCoord::ring(1).len(), 6);
        assert_eq!(HexCoord::ring(3).len(), 18);
        assert!(HexCoord::ring(3).iter().all(|h| h.length() == 3));
    }

    #[test]
    fn test_corners_are_hex_size_from_center() {
        let hex = HexCoord::new(1, -2);
        let center = hex.to_pixel(60.0);
        for corner in hex.corners(60.0) {
            assert!((center.distance_to(&corner) - 60.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_neighbouring_hexes_share_two_corners() {
        let a: HashSet<_> = HexCoord::new(0, 0)
            .corners(1.0)
            .iter()
            .map(|p| p.rounded_key(3))
            .collect();
        let b: HashSet<_> = HexCoord::new(1, 0)
            .corners(1.0)
            .iter()
            .map(|p| p.rounded_key(3))
            .collect();
        assert_eq!(a.intersection(&b).count(), 2);
    }

    #[test]
    fn test_pointy_top_has_top_corner() {
        // Corner 4 is at 210°, corner 5 at 270° (straight up in screen space)
        let corners = HexCoord::new(0, 0).corners(1.0);
        assert!(corners[5].x.abs() < 1e-9);
        assert!((corners[5].y + 1.0).abs() < 1e-9);
    }
}
