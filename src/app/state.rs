//! Interaction state management
//!
//! Defines the per-frame hover/press state machine. The state is a plain
//! value: [`StateMachine::process_frame`] takes the current state and one
//! frame's observation and returns the next state plus any edges. No OS
//! action happens here; the dispatcher acts on the returned press edge.

use crate::domain::keyboard::KeyId;

/// Hover and press state, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionState {
    /// Key under the fingertip
    pub hover_key: Option<KeyId>,
    /// Key recorded by the last press edge, until the finger opens again
    pub press_key: Option<KeyId>,
}

impl InteractionState {
    pub fn is_neutral(&self) -> bool {
        self.hover_key.is_none() && self.press_key.is_none()
    }
}

/// What the tracker and interpreter saw in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameObservation {
    /// Tracker returned no hand
    NoHand,
    /// A hand, but the fingertip landmark was dropped
    NoFingertip,
    /// Fingertip found; `key` is the hit-tested key under it
    Fingertip { key: Option<KeyId>, pressed: bool },
}

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: InteractionState,
    /// Set when this frame is a press edge onto the given key
    pub press_edge: Option<KeyId>,
    /// Set when the finger opened while a key was recorded as pressed
    pub release_edge: Option<KeyId>,
    pub hover_changed: bool,
}

/// State machine for the per-frame interaction state
pub struct StateMachine;

impl StateMachine {
    /// Processes one frame observation and returns the next state
    ///
    /// Evaluation order:
    /// 1. no hand, or no fingertip: back to neutral
    /// 2. fingertip: hover follows the hit-tested key
    /// 3. pressed over a key other than the recorded press key: press edge
    /// 4. not pressed while a press key is recorded: release edge
    ///
    /// Pressing over empty space leaves the recorded press key as it is.
    pub fn process_frame(current: InteractionState, observation: FrameObservation) -> Transition {
        match observation {
            FrameObservation::NoHand | FrameObservation::NoFingertip => {
                let next = InteractionState::default();
                Transition {
                    state: next,
                    press_edge: None,
                    release_edge: None,
                    hover_changed: current.hover_key != next.hover_key,
                }
            }

            FrameObservation::Fingertip { key, pressed } => {
                let mut next = current;
                let hover_changed = key != current.hover_key;
                next.hover_key = key;

                let mut press_edge = None;
                let mut release_edge = None;

                match (pressed, key) {
                    (true, Some(hit)) if current.press_key != Some(hit) => {
                        next.press_key = Some(hit);
                        press_edge = Some(hit);
                    }
                    (false, _) => {
                        release_edge = current.press_key;
                        next.press_key = None;
                    }
                    _ => {}
                }

                Transition {
                    state: next,
                    press_edge,
                    release_edge,
                    hover_changed,
                }
            }
        }
    }
}
