//! Hand landmark data as delivered by the tracker
//!
//! A hand is 21 anatomical points with fixed indices (0 = wrist,
//! 4 = thumb tip, 8 = index fingertip, ...). The tracker may drop points, so
//! every slot is optional.

use serde::{Deserialize, Serialize};

/// Number of landmarks per hand
pub const LANDMARK_COUNT: usize = 21;

/// Wrist / palm anchor
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_FINGER_TIP: usize = 8;
pub const MIDDLE_FINGER_TIP: usize = 12;

/// One tracked point, in camera pixels and in normalized 0..1 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// Pixel x in the camera frame
    pub x: f32,
    /// Pixel y in the camera frame
    pub y: f32,
    /// Depth relative to the wrist, as reported by the tracker
    pub z: f32,
    pub rel_x: f32,
    pub rel_y: f32,
    pub rel_z: f32,
}

impl Landmark {
    /// Builds a landmark from normalized coordinates for a frame of the given size
    ///
    /// Pixel coordinates are truncated to whole pixels.
    pub fn from_normalized(rel_x: f32, rel_y: f32, rel_z: f32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            x: (rel_x * frame_width as f32).trunc(),
            y: (rel_y * frame_height as f32).trunc(),
            z: rel_z,
            rel_x,
            rel_y,
            rel_z,
        }
    }

    /// Euclidean distance to another landmark in the pixel plane
    pub fn pixel_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Landmarks for one hand in one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandLandmarks {
    points: [Option<Landmark>; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a landmark; returns false when the index is outside 0..21
    pub fn insert(&mut self, index: usize, landmark: Landmark) -> bool {
        match self.points.get_mut(index) {
            Some(slot) => {
                *slot = Some(landmark);
                true
            }
            None => false,
        }
    }

    pub fn with(mut self, index: usize, landmark: Landmark) -> Self {
        self.insert(index, landmark);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index).and_then(Option::as_ref)
    }

    /// Number of landmarks present
    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Landmark)> {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.as_ref().map(|lm| (idx, lm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_normalized_truncates_to_pixels() {
        let lm = Landmark::from_normalized(0.5016, 0.25, -0.1, 640, 480);
        assert_eq!(lm.x, 321.0);
        assert_eq!(lm.y, 120.0);
        assert_eq!(lm.z, -0.1);
        assert_eq!(lm.rel_x, 0.5016);
    }

    #[test]
    fn insert_rejects_out_of_range_index() {
        let mut hand = HandLandmarks::new();
        assert!(hand.insert(20, Landmark::default()));
        assert!(!hand.insert(21, Landmark::default()));
        assert_eq!(hand.len(), 1);
        assert!(hand.get(21).is_none());
    }

    #[test]
    fn iter_skips_missing_points() {
        let hand = HandLandmarks::new()
            .with(WRIST, Landmark::default())
            .with(INDEX_FINGER_TIP, Landmark { x: 3.0, ..Landmark::default() });

        let indices: Vec<usize> = hand.iter().map(|(idx, _)| idx).collect();
        assert_eq!(indices, vec![WRIST, INDEX_FINGER_TIP]);
    }

    #[test]
    fn pixel_distance_ignores_depth() {
        let a = Landmark { x: 0.0, y: 0.0, z: 5.0, ..Landmark::default() };
        let b = Landmark { x: 3.0, y: 4.0, z: -5.0, ..Landmark::default() };
        assert_eq!(a.pixel_distance(&b), 5.0);
    }
}
