//! Colour table for the keyboard renderer

/// Opaque RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Converts from blue-green-red channel order
    pub const fn from_bgr(b: u8, g: u8, r: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_color(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, 255)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub key_normal: Rgb,
    pub key_hover: Rgb,
    pub key_pressed: Rgb,
    pub text_normal: Rgb,
    pub text_hover: Rgb,
    pub hand_landmarks: Rgb,
    pub fingertip: Rgb,
    pub palm_center: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgb::new(40, 40, 40),
            key_normal: Rgb::new(60, 60, 60),
            key_hover: Rgb::from_bgr(80, 120, 200),
            key_pressed: Rgb::from_bgr(120, 80, 200),
            text_normal: Rgb::new(200, 200, 200),
            text_hover: Rgb::new(255, 255, 255),
            hand_landmarks: Rgb::new(0, 255, 0),
            fingertip: Rgb::from_bgr(0, 255, 255),
            palm_center: Rgb::from_bgr(255, 0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_channels_are_swapped() {
        assert_eq!(Rgb::from_bgr(1, 2, 3), Rgb::new(3, 2, 1));
    }

    #[test]
    fn default_palette_colours() {
        let palette = Palette::default();
        assert_eq!(palette.key_hover, Rgb::new(200, 120, 80));
        assert_eq!(palette.key_pressed, Rgb::new(200, 80, 120));
        assert_eq!(palette.fingertip, Rgb::new(255, 255, 0));
        assert_eq!(palette.palm_center, Rgb::new(0, 0, 255));
    }
}
