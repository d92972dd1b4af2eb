//! Gesture interpretation
//!
//! Turns one hand's landmarks into a fingertip position and a pressed/hover
//! reading. A press is the index fingertip curled toward the palm anchor:
//! the fingertip-to-palm pixel distance drops below a fixed threshold.
//!
//! The threshold is not normalized by hand size, so the gesture gets easier
//! to trigger as the hand moves away from the camera.

use crate::domain::core::Point;
use crate::domain::hand::{HandLandmarks, INDEX_FINGER_TIP, Landmark, WRIST};

/// Which landmarks to read and how close counts as a press
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub fingertip_index: usize,
    pub palm_index: usize,
    /// Pixel distance below which the finger counts as pressed
    pub press_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            fingertip_index: INDEX_FINGER_TIP,
            palm_index: WRIST,
            press_threshold: 40.0,
        }
    }
}

/// Result of interpreting one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureReading {
    /// Fingertip in camera pixels, if the tracker reported it
    pub fingertip: Option<Landmark>,
    pub distance: Option<f32>,
    pub pressed: bool,
    /// Fingertip travel since the previous frame, in camera pixels
    pub movement: f32,
}

impl GestureReading {
    fn absent() -> Self {
        Self {
            fingertip: None,
            distance: None,
            pressed: false,
            movement: 0.0,
        }
    }
}

/// Kinematic queries over a single hand, plus the previous frame for movement
#[derive(Debug, Clone, Default)]
pub struct GestureInterpreter {
    config: GestureConfig,
    previous: Option<HandLandmarks>,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn fingertip<'a>(&self, hand: &'a HandLandmarks) -> Option<&'a Landmark> {
        hand.get(self.config.fingertip_index)
    }

    pub fn palm_center<'a>(&self, hand: &'a HandLandmarks) -> Option<&'a Landmark> {
        hand.get(self.config.palm_index)
    }

    /// Fingertip-to-palm pixel distance; `None` when either point is missing
    pub fn distance(&self, hand: &HandLandmarks) -> Option<f32> {
        let tip = self.fingertip(hand)?;
        let palm = self.palm_center(hand)?;
        Some(tip.pixel_distance(palm))
    }

    /// A missing distance is never a press
    pub fn is_pressed(&self, hand: &HandLandmarks, threshold: f32) -> bool {
        self.distance(hand).is_some_and(|d| d < threshold)
    }

    /// Fingertip travel since the previous frame; zero without a previous frame
    pub fn movement(&self, hand: &HandLandmarks) -> f32 {
        let Some(previous) = &self.previous else {
            return 0.0;
        };
        match (self.fingertip(hand), self.fingertip(previous)) {
            (Some(current), Some(prev)) => current.pixel_distance(prev),
            _ => 0.0,
        }
    }

    /// Interprets one frame and remembers it as the previous frame
    ///
    /// A frame without a hand forgets the previous frame, so movement restarts
    /// from zero once tracking resumes.
    pub fn interpret(&mut self, hand: Option<&HandLandmarks>) -> GestureReading {
        let Some(hand) = hand else {
            self.previous = None;
            return GestureReading::absent();
        };

        let reading = GestureReading {
            fingertip: self.fingertip(hand).copied(),
            distance: self.distance(hand),
            pressed: self.is_pressed(hand, self.config.press_threshold),
            movement: self.movement(hand),
        };
        self.previous = Some(hand.clone());
        reading
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Linear camera-to-display scaling, per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMapper {
    camera_width: u32,
    camera_height: u32,
    display_width: u32,
    display_height: u32,
}

impl CoordinateMapper {
    /// Returns `None` if either camera dimension is zero
    pub fn new(camera: (u32, u32), display: (u32, u32)) -> Option<Self> {
        if camera.0 == 0 || camera.1 == 0 {
            return None;
        }
        Some(Self {
            camera_width: camera.0,
            camera_height: camera.1,
            display_width: display.0,
            display_height: display.1,
        })
    }

    pub fn camera_size(&self) -> (u32, u32) {
        (self.camera_width, self.camera_height)
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }

    /// Maps a camera-space landmark to display pixels, truncating
    pub fn to_display(&self, landmark: &Landmark) -> Point {
        let x = landmark.x * self.display_width as f32 / self.camera_width as f32;
        let y = landmark.y * self.display_height as f32 / self.camera_height as f32;
        Point::new(x as i32, y as i32)
    }

    /// Inverse mapping, used by synthetic trackers to aim at a display point
    pub fn to_camera(&self, point: Point) -> (f32, f32) {
        let x = point.x as f32 * self.camera_width as f32 / self.display_width.max(1) as f32;
        let y = point.y as f32 * self.camera_height as f32 / self.display_height.max(1) as f32;
        (x, y)
    }
}
