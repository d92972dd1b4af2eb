//! Application orchestration layer
//!
//! Coordinates tracking, gesture interpretation, the interaction state
//! machine, keystroke dispatch and rendering.

pub mod controller;
pub mod dispatcher;
pub mod state;

pub use controller::{App, AppError, FpsCounter, FrameOutcome, KeyboardSession, RunOptions, RunSummary};
pub use dispatcher::{
    Debouncer, DispatchError, HoldOutcome, KeystrokeDispatcher, PressOutcome, ReleaseOutcome,
    ShutdownReport,
};
pub use state::{FrameObservation, InteractionState, StateMachine, Transition};
