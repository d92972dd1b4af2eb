//! Runtime configuration surface
//!
//! Every tunable is fixed at startup: defaults come from [`AppConfig::new`],
//! command-line flags overlay them, and [`AppConfig::validate`] rejects or
//! clamps what cannot work. Nothing is read back from or written to disk.

pub mod palette;
pub mod settings;

pub use palette::{Palette, Rgb};
pub use settings::{
    AppConfig, ConfigError, DisplayConfig, KeyboardConfig, TrackingConfig, TypingConfig,
};
