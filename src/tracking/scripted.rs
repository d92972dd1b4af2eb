//! Deterministic synthetic hand
//!
//! Drives the whole pipeline without a camera: for every label in the script
//! the fingertip hovers over the key's centre with the finger open, then
//! curls toward the palm for a few frames. Frame timestamps advance by a
//! fixed interval from the start instant, so runs are reproducible.

use std::time::{Duration, Instant};

use crate::domain::gesture::{CoordinateMapper, GestureConfig};
use crate::domain::hand::{HandLandmarks, Landmark};
use crate::domain::keyboard::Layout;
use crate::tracking::{FrameSource, TrackedFrame, TrackingError};

/// Frame pacing and finger poses of the scripted hand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptTiming {
    /// Open-finger frames over each key before pressing
    pub hover_frames: usize,
    /// Closed-finger frames per key
    pub press_frames: usize,
    /// Frames without any hand after each key
    pub gap_frames: usize,
    pub frame_interval: Duration,
    /// Fingertip-to-palm distance while hovering, camera pixels
    pub open_distance: f32,
    /// Fingertip-to-palm distance while pressing, camera pixels
    pub closed_distance: f32,
}

impl Default for ScriptTiming {
    fn default() -> Self {
        Self {
            hover_frames: 8,
            press_frames: 4,
            gap_frames: 0,
            frame_interval: Duration::from_micros(33_333),
            open_distance: 80.0,
            closed_distance: 20.0,
        }
    }
}

impl ScriptTiming {
    pub fn frames_per_key(&self) -> usize {
        self.hover_frames + self.press_frames + self.gap_frames
    }
}

/// Maps text to the layout labels that type it
///
/// Space and newline become the named keys; letters are lowercased.
pub fn labels_for_text(text: &str) -> Vec<String> {
    text.chars()
        .map(|ch| match ch {
            ' ' => "space".to_string(),
            '\n' => "enter".to_string(),
            '\t' => "tab".to_string(),
            other => other.to_lowercase().collect(),
        })
        .collect()
}

pub struct ScriptedSource {
    frames: Vec<Option<HandLandmarks>>,
    cursor: usize,
    next_at: Instant,
    timing: ScriptTiming,
}

impl ScriptedSource {
    /// Plans the frames that visit and press every label in turn
    ///
    /// Fails if a label is not on the layout.
    pub fn new(
        layout: &Layout,
        mapper: &CoordinateMapper,
        gesture: &GestureConfig,
        labels: &[String],
        timing: ScriptTiming,
        start: Instant,
    ) -> Result<Self, TrackingError> {
        let mut frames = Vec::with_capacity(labels.len() * timing.frames_per_key());

        for label in labels {
            let id = layout
                .find_label(label)
                .ok_or_else(|| TrackingError::UnknownLabel(label.clone()))?;
            let Some(key) = layout.key(id) else {
                return Err(TrackingError::UnknownLabel(label.clone()));
            };

            let (tip_x, tip_y) = mapper.to_camera(key.rect.center());
            let open = synthetic_hand(mapper, gesture, (tip_x, tip_y), timing.open_distance);
            let closed = synthetic_hand(mapper, gesture, (tip_x, tip_y), timing.closed_distance);

            frames.extend(std::iter::repeat_n(Some(open), timing.hover_frames));
            frames.extend(std::iter::repeat_n(Some(closed), timing.press_frames));
            frames.extend(std::iter::repeat_n(None, timing.gap_frames));
        }

        Ok(Self {
            frames,
            cursor: 0,
            next_at: start,
            timing,
        })
    }

    /// Total number of frames the script will emit
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.cursor
    }

    pub fn timing(&self) -> &ScriptTiming {
        &self.timing
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, TrackingError> {
        let Some(hand) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let captured_at = self.next_at;
        // Saturates instead of overflowing the clock on absurd intervals
        self.next_at = captured_at
            .checked_add(self.timing.frame_interval)
            .unwrap_or(captured_at);
        self.cursor += 1;
        Ok(Some(TrackedFrame::new(hand.iter().cloned().collect(), captured_at)))
    }
}

/// Fingertip at `tip`, palm anchor straight below it at `distance`
fn synthetic_hand(
    mapper: &CoordinateMapper,
    gesture: &GestureConfig,
    tip: (f32, f32),
    distance: f32,
) -> HandLandmarks {
    let (cam_w, cam_h) = mapper.camera_size();
    let point = |x: f32, y: f32| Landmark {
        x,
        y,
        z: 0.0,
        rel_x: x / cam_w as f32,
        rel_y: y / cam_h as f32,
        rel_z: 0.0,
    };

    HandLandmarks::new()
        .with(gesture.palm_index, point(tip.0, tip.1 + distance))
        .with(gesture.fingertip_index, point(tip.0, tip.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Point;
    use crate::domain::gesture::GestureInterpreter;
    use crate::domain::keyboard::{LayoutGeometry, QWERTY_ROWS, SpecialKeyTable, rows_from};

    fn layout() -> Layout {
        let geometry = LayoutGeometry {
            key_width: 60,
            key_height: 60,
            key_spacing: 5,
            origin: Point::new(140, 370),
            keyboard_width: 1000,
        };
        Layout::build(&rows_from(QWERTY_ROWS), geometry, SpecialKeyTable::standard()).unwrap()
    }

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new((640, 480), (1280, 720)).unwrap()
    }

    fn source(labels: &[&str], timing: ScriptTiming, start: Instant) -> ScriptedSource {
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        ScriptedSource::new(&layout(), &mapper(), &GestureConfig::default(), &labels, timing, start)
            .unwrap()
    }

    #[test]
    fn text_maps_to_labels() {
        assert_eq!(labels_for_text("Hi there\n"), vec!["h", "i", "space", "t", "h", "e", "r", "e", "enter"]);
    }

    #[test]
    fn emits_planned_frames_then_ends() {
        let timing = ScriptTiming::default();
        let mut src = source(&["q", "w"], timing, Instant::now());
        assert_eq!(src.len(), 2 * timing.frames_per_key());

        let mut count = 0;
        while let Some(_) = src.next_frame().unwrap() {
            count += 1;
        }
        assert_eq!(count, src.len());
        assert_eq!(src.remaining(), 0);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn timestamps_advance_by_interval() {
        let start = Instant::now();
        let timing = ScriptTiming::default();
        let mut src = source(&["a"], timing, start);
        let first = src.next_frame().unwrap().unwrap();
        let second = src.next_frame().unwrap().unwrap();
        assert_eq!(first.captured_at, start);
        assert_eq!(second.captured_at - first.captured_at, timing.frame_interval);
    }

    #[test]
    fn oversized_interval_does_not_overflow_the_clock() {
        let start = Instant::now();
        let timing = ScriptTiming {
            frame_interval: Duration::MAX,
            ..ScriptTiming::default()
        };
        let mut src = source(&["a"], timing, start);
        let mut stamps = Vec::new();
        while let Some(frame) = src.next_frame().unwrap() {
            stamps.push(frame.captured_at);
        }
        assert_eq!(stamps.len(), src.len());
        assert!(stamps.iter().all(|&t| t == start));
    }

    #[test]
    fn fingertip_lands_on_the_scripted_key() {
        let layout = layout();
        let mapper = mapper();
        let mut src = source(&["g"], ScriptTiming::default(), Instant::now());
        let frame = src.next_frame().unwrap().unwrap();
        let hand = frame.primary_hand().unwrap();

        let interpreter = GestureInterpreter::new(GestureConfig::default());
        let tip = mapper.to_display(interpreter.fingertip(hand).unwrap());
        let hit = layout.hit_test(tip.x, tip.y).unwrap();
        assert_eq!(layout.character_of(hit), Some("g"));
    }

    #[test]
    fn hover_then_press_poses() {
        let timing = ScriptTiming {
            hover_frames: 2,
            press_frames: 1,
            gap_frames: 1,
            ..ScriptTiming::default()
        };
        let mut src = source(&["enter"], timing, Instant::now());
        let interpreter = GestureInterpreter::new(GestureConfig::default());

        let mut pressed = Vec::new();
        while let Some(frame) = src.next_frame().unwrap() {
            pressed.push(
                frame
                    .primary_hand()
                    .map(|hand| interpreter.is_pressed(hand, 40.0)),
            );
        }
        assert_eq!(pressed, vec![Some(false), Some(false), Some(true), None]);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let labels = vec!["f13".to_string()];
        let result = ScriptedSource::new(
            &layout(),
            &mapper(),
            &GestureConfig::default(),
            &labels,
            ScriptTiming::default(),
            Instant::now(),
        );
        assert!(matches!(result, Err(TrackingError::UnknownLabel(label)) if label == "f13"));
    }
}
