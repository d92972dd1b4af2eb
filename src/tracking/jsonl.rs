//! JSON-lines tracker protocol
//!
//! An external tracker process writes one JSON object per camera frame:
//!
//! ```text
//! {"t":0.033,"hands":[{"landmarks":[{"id":0,"x":320,"y":400},{"id":8,"x":318,"y":250}]}]}
//! ```
//!
//! `t` (seconds since the stream started) is optional; without it the frame
//! is stamped on arrival. `z` and the normalized `rel_*` fields default to 0.
//! Blank lines are skipped. End of input ends the stream.

use std::io::BufRead;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::domain::hand::{HandLandmarks, LANDMARK_COUNT, Landmark};
use crate::tracking::{FrameSource, TrackedFrame, TrackingError};

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    hands: Vec<WireHand>,
}

#[derive(Debug, Deserialize)]
struct WireHand {
    landmarks: Vec<WireLandmark>,
}

#[derive(Debug, Deserialize)]
struct WireLandmark {
    id: usize,
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
    #[serde(default)]
    rel_x: f32,
    #[serde(default)]
    rel_y: f32,
    #[serde(default)]
    rel_z: f32,
}

/// Reads tracked frames from any buffered reader (stdin, a pipe, a file)
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    line_no: usize,
    buffer: Vec<u8>,
    start: Instant,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_start(reader, Instant::now())
    }

    /// `t` offsets in the stream are measured from `start`
    pub fn with_start(reader: R, start: Instant) -> Self {
        Self {
            reader,
            line_no: 0,
            buffer: Vec::new(),
            start,
        }
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    fn parse_line(&self, line: &str) -> Result<TrackedFrame, TrackingError> {
        let malformed = |reason: String| TrackingError::Malformed {
            line: self.line_no,
            reason,
        };

        let wire: WireFrame = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;

        let captured_at = match wire.t {
            Some(t) if t >= 0.0 => Duration::try_from_secs_f64(t)
                .ok()
                .and_then(|offset| self.start.checked_add(offset))
                .ok_or_else(|| malformed(format!("timestamp {} out of range", t)))?,
            Some(t) => return Err(malformed(format!("invalid timestamp {}", t))),
            None => Instant::now(),
        };

        let mut hands = Vec::with_capacity(wire.hands.len());
        for hand in wire.hands {
            let mut landmarks = HandLandmarks::new();
            for lm in hand.landmarks {
                let point = Landmark {
                    x: lm.x,
                    y: lm.y,
                    z: lm.z,
                    rel_x: lm.rel_x,
                    rel_y: lm.rel_y,
                    rel_z: lm.rel_z,
                };
                if !landmarks.insert(lm.id, point) {
                    return Err(malformed(format!(
                        "landmark id {} outside 0..{}",
                        lm.id, LANDMARK_COUNT
                    )));
                }
            }
            hands.push(landmarks);
        }

        Ok(TrackedFrame::new(hands, captured_at))
    }
}

impl<R: BufRead> FrameSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, TrackingError> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            // The bytes are consumed either way, so bad encoding only costs this line
            let line = match std::str::from_utf8(&self.buffer) {
                Ok(text) => text.trim(),
                Err(e) => {
                    return Err(TrackingError::Malformed {
                        line: self.line_no,
                        reason: format!("invalid UTF-8: {}", e),
                    });
                }
            };
            if line.is_empty() {
                continue;
            }
            return self.parse_line(line).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hand::{INDEX_FINGER_TIP, WRIST};
    use std::io::Cursor;

    fn source(input: &str) -> JsonLinesSource<Cursor<Vec<u8>>> {
        JsonLinesSource::new(Cursor::new(input.as_bytes().to_vec()))
    }

    #[test]
    fn parses_hands_and_landmarks() {
        let mut src = source(concat!(
            r#"{"hands":[{"landmarks":[{"id":0,"x":320,"y":400,"rel_x":0.5},"#,
            r#"{"id":8,"x":318.5,"y":250,"z":-0.25}]}]}"#,
            "\n"
        ));
        let frame = src.next_frame().unwrap().unwrap();
        let hand = frame.primary_hand().unwrap();

        assert_eq!(hand.len(), 2);
        assert_eq!(hand.get(WRIST).unwrap().rel_x, 0.5);
        let tip = hand.get(INDEX_FINGER_TIP).unwrap();
        assert_eq!((tip.x, tip.y, tip.z), (318.5, 250.0, -0.25));
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn skips_blank_lines_and_tracks_line_numbers() {
        let mut src = source("\n   \n{\"hands\":[]}\n");
        let frame = src.next_frame().unwrap().unwrap();
        assert!(frame.hands.is_empty());
        assert_eq!(src.line_number(), 3);
    }

    #[test]
    fn timestamps_are_offsets_from_start() {
        let start = Instant::now();
        let input = "{\"t\":0.5,\"hands\":[]}\n";
        let mut src = JsonLinesSource::with_start(Cursor::new(input.as_bytes().to_vec()), start);
        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.captured_at, start + Duration::from_millis(500));
    }

    #[test]
    fn malformed_line_is_frame_local_and_stream_continues() {
        let mut src = source("not json\n{\"hands\":[]}\n");
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, TrackingError::Malformed { line: 1, .. }));
        assert!(err.is_frame_local());
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn out_of_range_landmark_id_is_malformed() {
        let mut src = source(r#"{"hands":[{"landmarks":[{"id":21,"x":1,"y":1}]}]}"#);
        assert!(matches!(
            src.next_frame(),
            Err(TrackingError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn negative_timestamp_is_malformed() {
        let mut src = source(r#"{"t":-1.0,"hands":[]}"#);
        assert!(matches!(src.next_frame(), Err(TrackingError::Malformed { .. })));
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let mut src = source("{\"t\":1e30,\"hands\":[]}\n{\"t\":1.8e19,\"hands\":[]}\n{\"hands\":[]}\n");
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, TrackingError::Malformed { line: 1, .. }));
        assert!(err.is_frame_local());
        assert!(matches!(
            src.next_frame(),
            Err(TrackingError::Malformed { line: 2, .. })
        ));
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn invalid_utf8_line_is_frame_local_and_stream_continues() {
        let mut src = JsonLinesSource::new(Cursor::new(b"\xff\xfe garbage\n{\"hands\":[]}\n".to_vec()));
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, TrackingError::Malformed { line: 1, .. }));
        assert!(err.is_frame_local());
        let frame = src.next_frame().unwrap().unwrap();
        assert!(frame.hands.is_empty());
        assert_eq!(src.line_number(), 2);
    }
}
