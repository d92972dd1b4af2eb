use std::time::Duration;

use thiserror::Error;

use crate::config::palette::Palette;
use crate::domain::core::Point;
use crate::domain::gesture::{CoordinateMapper, GestureConfig};
use crate::domain::hand::{INDEX_FINGER_TIP, LANDMARK_COUNT, WRIST};
use crate::domain::keyboard::{
    Layout, LayoutError, LayoutGeometry, QWERTY_ROWS, SpecialKeyTable, rows_from,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Display size {width}x{height} is invalid")]
    InvalidDisplay { width: u32, height: u32 },
    #[error("Camera size {width}x{height} is invalid")]
    InvalidCamera { width: u32, height: u32 },
    #[error("{name} landmark index {index} is outside 0..21")]
    LandmarkOutOfRange { name: &'static str, index: usize },
    #[error("Press threshold must be a positive number of pixels, got {0}")]
    InvalidThreshold(f32),
    #[error("Keyboard layout rejected: {0}")]
    Layout(#[from] LayoutError),
}

/// Output window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Keyboard area, key geometry and the row table
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardConfig {
    pub width: i32,
    pub height: i32,
    /// Gap between the keyboard area and the bottom of the display
    pub bottom_margin: i32,
    pub key_width: i32,
    pub key_height: i32,
    pub key_spacing: i32,
    pub key_rounding: f32,
    pub rows: Vec<Vec<String>>,
    pub specials: SpecialKeyTable,
}

impl KeyboardConfig {
    pub const MIN_SPACING: i32 = 1;

    /// Corner radius can never exceed half the shorter key side
    pub fn sanitize_rounding(&self) -> f32 {
        let limit = (self.key_width.min(self.key_height) as f32 / 2.0).max(0.0);
        if self.key_rounding.is_finite() {
            self.key_rounding.clamp(0.0, limit)
        } else {
            0.0
        }
    }

    /// Top-left of the keyboard area, horizontally centred on the display
    pub fn origin(&self, display: &DisplayConfig) -> Point {
        let x = (display.width as i32 - self.width).div_euclid(2);
        let y = display.height as i32 - self.height - self.bottom_margin;
        Point::new(x, y)
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 300,
            bottom_margin: 50,
            key_width: 60,
            key_height: 60,
            key_spacing: 5,
            key_rounding: 8.0,
            rows: rows_from(QWERTY_ROWS),
            specials: SpecialKeyTable::standard(),
        }
    }
}

/// Camera frame size and landmark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    pub camera_width: u32,
    pub camera_height: u32,
    pub fingertip_index: usize,
    pub palm_index: usize,
    /// Interpret every Nth frame; the rest are only rendered
    pub skip_frames: u32,
}

impl TrackingConfig {
    pub fn sanitize_skip(value: u32) -> u32 {
        value.max(1)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            camera_width: 640,
            camera_height: 480,
            fingertip_index: INDEX_FINGER_TIP,
            palm_index: WRIST,
            skip_frames: 1,
        }
    }
}

/// Press detection and dispatch timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingConfig {
    pub press_threshold: f32,
    pub debounce: Duration,
    /// Fingertip travel per frame above which the hand counts as moving
    pub movement_threshold: f32,
}

impl TypingConfig {
    pub const MAX_DEBOUNCE: Duration = Duration::from_secs(5);

    pub fn sanitize_debounce(value: Duration) -> Duration {
        value.min(Self::MAX_DEBOUNCE)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            press_threshold: 40.0,
            debounce: Duration::from_millis(300),
            movement_threshold: 10.0,
        }
    }
}

/// Startup configuration; fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub keyboard: KeyboardConfig,
    pub tracking: TrackingConfig,
    pub typing: TypingConfig,
    pub palette: Palette,
    /// Start with the keyboard drawn
    pub keyboard_visible: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            keyboard: KeyboardConfig::default(),
            tracking: TrackingConfig::default(),
            typing: TypingConfig::default(),
            palette: Palette::default(),
            keyboard_visible: true,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks hard errors and clamps soft ones
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let DisplayConfig { width, height, .. } = self.display;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDisplay { width, height });
        }

        let TrackingConfig {
            camera_width,
            camera_height,
            fingertip_index,
            palm_index,
            ..
        } = self.tracking;
        if camera_width == 0 || camera_height == 0 {
            return Err(ConfigError::InvalidCamera {
                width: camera_width,
                height: camera_height,
            });
        }
        if fingertip_index >= LANDMARK_COUNT {
            return Err(ConfigError::LandmarkOutOfRange {
                name: "Fingertip",
                index: fingertip_index,
            });
        }
        if palm_index >= LANDMARK_COUNT {
            return Err(ConfigError::LandmarkOutOfRange {
                name: "Palm",
                index: palm_index,
            });
        }

        let threshold = self.typing.press_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        self.tracking.skip_frames = TrackingConfig::sanitize_skip(self.tracking.skip_frames);
        self.typing.debounce = TypingConfig::sanitize_debounce(self.typing.debounce);
        self.keyboard.key_spacing = self.keyboard.key_spacing.max(KeyboardConfig::MIN_SPACING);
        self.keyboard.key_rounding = self.keyboard.sanitize_rounding();
        if !self.typing.movement_threshold.is_finite() || self.typing.movement_threshold < 0.0 {
            self.typing.movement_threshold = TypingConfig::default().movement_threshold;
        }

        // Surface layout problems at startup rather than on first use
        self.build_layout()?;
        Ok(self)
    }

    pub fn layout_geometry(&self) -> LayoutGeometry {
        LayoutGeometry {
            key_width: self.keyboard.key_width,
            key_height: self.keyboard.key_height,
            key_spacing: self.keyboard.key_spacing,
            origin: self.keyboard.origin(&self.display),
            keyboard_width: self.keyboard.width,
        }
    }

    pub fn build_layout(&self) -> Result<Layout, ConfigError> {
        Ok(Layout::build(
            &self.keyboard.rows,
            self.layout_geometry(),
            self.keyboard.specials.clone(),
        )?)
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            fingertip_index: self.tracking.fingertip_index,
            palm_index: self.tracking.palm_index,
            press_threshold: self.typing.press_threshold,
        }
    }

    pub fn coordinate_mapper(&self) -> Result<CoordinateMapper, ConfigError> {
        let TrackingConfig {
            camera_width,
            camera_height,
            ..
        } = self.tracking;
        CoordinateMapper::new(
            (camera_width, camera_height),
            (self.display.width, self.display.height),
        )
        .ok_or(ConfigError::InvalidCamera {
            width: camera_width,
            height: camera_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = AppConfig::new();
        assert_eq!(config.keyboard.origin(&config.display), Point::new(140, 370));
        assert_eq!(config.typing.debounce, Duration::from_millis(300));
        assert_eq!(config.tracking.skip_frames, 1);
        assert!(config.keyboard_visible);
    }

    #[test]
    fn default_config_validates_and_builds() {
        let config = AppConfig::new().validate().unwrap();
        let layout = config.build_layout().unwrap();
        assert_eq!(layout.row_count(), 5);
        assert!(config.coordinate_mapper().is_ok());
        assert_eq!(config.gesture_config(), GestureConfig::default());
    }

    #[test]
    fn soft_values_are_clamped() {
        let mut config = AppConfig::new();
        config.tracking.skip_frames = 0;
        config.keyboard.key_spacing = 0;
        config.keyboard.key_rounding = 500.0;
        config.typing.debounce = Duration::from_secs(60);

        let config = config.validate().unwrap();
        assert_eq!(config.tracking.skip_frames, 1);
        assert_eq!(config.keyboard.key_spacing, 1);
        assert_eq!(config.keyboard.key_rounding, 30.0);
        assert_eq!(config.typing.debounce, TypingConfig::MAX_DEBOUNCE);
    }

    #[test]
    fn hard_errors_are_reported() {
        let mut config = AppConfig::new();
        config.tracking.camera_width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCamera { .. })));

        let mut config = AppConfig::new();
        config.typing.press_threshold = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));

        let mut config = AppConfig::new();
        config.tracking.palm_index = 21;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LandmarkOutOfRange { name: "Palm", index: 21 })
        ));
    }

    #[test]
    fn layout_errors_abort_validation() {
        let mut config = AppConfig::new();
        config.keyboard.rows = vec![vec!["q".to_string(), "f13".to_string()]];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Layout(LayoutError::UnknownKeyName { .. }))
        ));
    }
}
