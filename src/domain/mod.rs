//! Domain logic and core data structures
//!
//! Pure geometry and kinematics, independent of the camera, the tracker,
//! the renderer and the OS input layer.

pub mod core;
pub mod gesture;
pub mod hand;
pub mod keyboard;
