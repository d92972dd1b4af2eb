//! Hand-tracked virtual keyboard
//!
//! Turns fingertip positions from an external hand tracker into debounced
//! keystrokes: a static keyboard layout answers which key is under the
//! fingertip, a gesture interpreter decides whether the finger is pressing,
//! and a dispatcher sends the keystroke while guaranteeing no key is left
//! held down.

pub mod app;
pub mod config;
pub mod domain;
pub mod input;
pub mod platform;
pub mod tracking;
pub mod ui;
