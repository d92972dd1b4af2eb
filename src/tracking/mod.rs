//! Hand-tracking collaborator
//!
//! The camera and landmark detector live outside this crate. A
//! [`FrameSource`] hands over one [`TrackedFrame`] per call and blocks until
//! it has one.

pub mod jsonl;
pub mod scripted;

use std::time::Instant;

use crate::domain::hand::HandLandmarks;

pub use jsonl::JsonLinesSource;
pub use scripted::{ScriptTiming, ScriptedSource, labels_for_text};

/// Errors raised by a frame source
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Tracker stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tracker frame on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Scripted source has no key labelled '{0}'")]
    UnknownLabel(String),
}

impl TrackingError {
    /// True for errors that only spoil the current frame
    pub fn is_frame_local(&self) -> bool {
        matches!(self, TrackingError::Malformed { .. })
    }
}

/// Hands detected in one camera frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFrame {
    /// Detected hands; only the first one drives typing
    pub hands: Vec<HandLandmarks>,
    pub captured_at: Instant,
}

impl TrackedFrame {
    pub fn new(hands: Vec<HandLandmarks>, captured_at: Instant) -> Self {
        Self { hands, captured_at }
    }

    pub fn empty(captured_at: Instant) -> Self {
        Self::new(Vec::new(), captured_at)
    }

    pub fn primary_hand(&self) -> Option<&HandLandmarks> {
        self.hands.first()
    }
}

/// Blocking producer of tracked frames
pub trait FrameSource {
    /// Next frame, `Ok(None)` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, TrackingError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<TrackedFrame>, TrackingError> {
        self.as_mut().next_frame()
    }
}
