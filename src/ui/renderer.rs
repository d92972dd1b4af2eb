//! Keyboard rendering
//!
//! Rasterizes the on-screen keyboard with tiny-skia and, when a font is
//! loaded, draws key labels with ab_glyph. Scene calculation is separate from
//! rasterization so the colour and placement rules can be tested without
//! touching pixels. The renderer only reads interaction state.

use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use tiny_skia::{
    Color, FillRule, Paint, Path as SkiaPath, PathBuilder, Pixmap, PremultipliedColorU8,
    Rect as SkiaRect, Stroke, Transform,
};

use crate::config::{Palette, Rgb};
use crate::domain::core::{Point, Rect};
use crate::domain::keyboard::{KeyId, Layout};

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Failed to create {width}x{height} pixmap for rendering")]
    PixmapCreationFailed { width: u32, height: u32 },

    #[error("Failed to load font '{path}': {reason}")]
    FontLoad { path: String, reason: String },

    #[error("Failed to encode frame: {0}")]
    Encoding(String),

    #[error("Failed to write frame: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only snapshot of what to draw this frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderView {
    pub hover: Option<KeyId>,
    pub pressed: Option<KeyId>,
    /// Fingertip in display coordinates
    pub fingertip: Option<Point>,
    /// Palm anchor in display coordinates
    pub palm: Option<Point>,
    pub keyboard_visible: bool,
    /// Fingertip-to-palm distance in camera pixels
    pub distance: Option<f32>,
    pub fps: f32,
}

/// Rendering collaborator of the frame loop
pub trait FrameRenderer {
    fn render(&mut self, layout: &Layout, view: &RenderView) -> Result<(), RendererError>;
}

/// Visual state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVisual {
    Normal,
    Hover,
    Pressed,
}

impl KeyVisual {
    /// Pressed wins over hover
    pub fn for_key(id: KeyId, view: &RenderView) -> Self {
        if view.pressed == Some(id) {
            KeyVisual::Pressed
        } else if view.hover == Some(id) {
            KeyVisual::Hover
        } else {
            KeyVisual::Normal
        }
    }

    pub fn colors(self, palette: &Palette) -> (Rgb, Rgb) {
        match self {
            KeyVisual::Normal => (palette.key_normal, palette.text_normal),
            KeyVisual::Hover => (palette.key_hover, palette.text_hover),
            KeyVisual::Pressed => (palette.key_pressed, palette.text_hover),
        }
    }
}

/// One key as it will be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct KeyShape {
    pub id: KeyId,
    pub rect: Rect,
    pub visual: KeyVisual,
    pub fill: Rgb,
    pub text: String,
    pub text_color: Rgb,
}

/// Pre-calculated scene for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardScene {
    pub keys: Vec<KeyShape>,
    pub fingertip: Option<Point>,
    pub palm: Option<Point>,
    pub status: String,
}

impl KeyboardScene {
    pub fn from_layout(layout: &Layout, view: &RenderView, palette: &Palette) -> Self {
        let keys = if view.keyboard_visible {
            layout
                .keys()
                .iter()
                .map(|key| {
                    let visual = KeyVisual::for_key(key.id, view);
                    let (fill, text_color) = visual.colors(palette);
                    KeyShape {
                        id: key.id,
                        rect: key.rect,
                        visual,
                        fill,
                        text: display_label(&key.label),
                        text_color,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let status = match view.distance {
            Some(d) => format!("FPS: {:.1}  Distance: {:.0}", view.fps, d),
            None => format!("FPS: {:.1}", view.fps),
        };

        Self {
            keys,
            fingertip: view.fingertip,
            palm: view.palm,
            status,
        }
    }

    pub fn key(&self, id: KeyId) -> Option<&KeyShape> {
        self.keys.iter().find(|shape| shape.id == id)
    }
}

/// Single characters are shown upper-cased, key names as they are
fn display_label(label: &str) -> String {
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => ch.to_uppercase().collect(),
        _ => label.to_string(),
    }
}

/// Placement of the keyboard inside the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderGeometry {
    pub width: u32,
    pub height: u32,
    /// Area painted with the background colour behind the keys
    pub keyboard_area: Rect,
    pub key_rounding: f32,
    pub font_size: f32,
}

/// tiny-skia keyboard rasterizer
pub struct KeyboardRenderer {
    geometry: RenderGeometry,
    palette: Palette,
    font: Option<FontVec>,
    pixmap: Pixmap,
    frames_rendered: u64,
}

impl KeyboardRenderer {
    pub fn new(geometry: RenderGeometry, palette: Palette) -> Result<Self, RendererError> {
        let pixmap = Pixmap::new(geometry.width, geometry.height).ok_or(
            RendererError::PixmapCreationFailed {
                width: geometry.width,
                height: geometry.height,
            },
        )?;

        Ok(Self {
            geometry,
            palette,
            font: None,
            pixmap,
            frames_rendered: 0,
        })
    }

    /// Loads a TrueType/OpenType font for key labels
    pub fn load_font(path: &Path) -> Result<FontVec, RendererError> {
        let font_load = |reason: String| RendererError::FontLoad {
            path: path.display().to_string(),
            reason,
        };
        let data = std::fs::read(path).map_err(|e| font_load(e.to_string()))?;
        FontVec::try_from_vec(data).map_err(|e| font_load(e.to_string()))
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RendererError> {
        self.pixmap
            .encode_png()
            .map_err(|e| RendererError::Encoding(e.to_string()))
    }

    /// Writes the last rendered frame as PNG
    pub fn save_png(&self, path: &Path) -> Result<(), RendererError> {
        let data = self.encode_png()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn draw_scene(&mut self, scene: &KeyboardScene) {
        self.pixmap.fill(Color::BLACK);

        if !scene.keys.is_empty() {
            if let Some(area) = to_skia_rect(self.geometry.keyboard_area) {
                let paint = solid(self.palette.background);
                self.pixmap.fill_rect(area, &paint, Transform::identity(), None);
            }
        }

        for shape in &scene.keys {
            let Some(rect) = to_skia_rect(shape.rect) else {
                continue;
            };
            if let Some(path) = rounded_rect(rect, self.geometry.key_rounding) {
                let paint = solid(shape.fill);
                self.pixmap
                    .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }

        if let Some(font) = &self.font {
            let scale = PxScale::from(self.geometry.font_size);
            for shape in &scene.keys {
                draw_text_centered(&mut self.pixmap, font, scale, &shape.text, shape.rect, shape.text_color);
            }
            let status_y = self.geometry.height as f32 - 30.0;
            draw_text(&mut self.pixmap, font, scale, &scene.status, (10.0, status_y), self.palette.text_normal);
        }

        if let (Some(tip), Some(palm)) = (scene.fingertip, scene.palm) {
            let mut builder = PathBuilder::new();
            builder.move_to(tip.x as f32, tip.y as f32);
            builder.line_to(palm.x as f32, palm.y as f32);
            if let Some(path) = builder.finish() {
                let stroke = Stroke {
                    width: 2.0,
                    ..Stroke::default()
                };
                let paint = solid(self.palette.hand_landmarks);
                self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
        if let Some(palm) = scene.palm {
            fill_circle(&mut self.pixmap, palm, 8.0, self.palette.palm_center);
        }
        if let Some(tip) = scene.fingertip {
            fill_circle(&mut self.pixmap, tip, 10.0, self.palette.fingertip);
        }
    }
}

impl FrameRenderer for KeyboardRenderer {
    fn render(&mut self, layout: &Layout, view: &RenderView) -> Result<(), RendererError> {
        let scene = KeyboardScene::from_layout(layout, view, &self.palette);
        self.draw_scene(&scene);
        self.frames_rendered += 1;
        Ok(())
    }
}

fn solid(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color());
    paint.anti_alias = true;
    paint
}

fn to_skia_rect(rect: Rect) -> Option<SkiaRect> {
    SkiaRect::from_xywh(rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32)
}

fn rounded_rect(rect: SkiaRect, radius: f32) -> Option<SkiaPath> {
    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(rect));
    }

    let (l, t, rt, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.quad_to(rt, t, rt, t + r);
    pb.line_to(rt, b - r);
    pb.quad_to(rt, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.quad_to(l, b, l, b - r);
    pb.line_to(l, t + r);
    pb.quad_to(l, t, l + r, t);
    pb.close();
    pb.finish()
}

fn fill_circle(pixmap: &mut Pixmap, center: Point, radius: f32, color: Rgb) {
    let mut pb = PathBuilder::new();
    pb.push_circle(center.x as f32, center.y as f32, radius);
    if let Some(path) = pb.finish() {
        pixmap.fill_path(&path, &solid(color), FillRule::Winding, Transform::identity(), None);
    }
}

fn text_width<F: Font>(font: &F, scale: PxScale, text: &str) -> f32 {
    let scaled = font.as_scaled(scale);
    text.chars().map(|ch| scaled.h_advance(font.glyph_id(ch))).sum()
}

fn draw_text_centered<F: Font>(
    pixmap: &mut Pixmap,
    font: &F,
    scale: PxScale,
    text: &str,
    rect: Rect,
    color: Rgb,
) {
    let scaled = font.as_scaled(scale);
    let width = text_width(font, scale, text);
    let x = rect.x as f32 + (rect.w as f32 - width) / 2.0;
    let center_y = rect.y as f32 + rect.h as f32 / 2.0;
    let baseline = center_y + (scaled.ascent() + scaled.descent()) / 2.0;
    draw_text(pixmap, font, scale, text, (x, baseline), color);
}

/// Draws `text` with its baseline starting at `origin`
fn draw_text<F: Font>(
    pixmap: &mut Pixmap,
    font: &F,
    scale: PxScale,
    text: &str,
    origin: (f32, f32),
    color: Rgb,
) {
    let scaled = font.as_scaled(scale);
    let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);
    let mut caret = origin.0;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        let glyph = id.with_scale_and_position(scale, point(caret, origin.1));
        caret += scaled.h_advance(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        let pixels = pixmap.pixels_mut();

        outlined.draw(|gx, gy, coverage| {
            let px = bounds.min.x as i32 + gx as i32;
            let py = bounds.min.y as i32 + gy as i32;
            if px < 0 || py < 0 || px >= width || py >= height {
                return;
            }
            let idx = (py * width + px) as usize;
            if let Some(blended) = blend(pixels[idx], color, coverage) {
                pixels[idx] = blended;
            }
        });
    }
}

/// Source-over of an opaque colour at `coverage` onto a premultiplied pixel
fn blend(dst: PremultipliedColorU8, color: Rgb, coverage: f32) -> Option<PremultipliedColorU8> {
    let a = coverage.clamp(0.0, 1.0);
    let mix = |src: u8, dst: u8| (src as f32 * a + dst as f32 * (1.0 - a)).round() as u8;
    PremultipliedColorU8::from_rgba(
        mix(color.r, dst.red()),
        mix(color.g, dst.green()),
        mix(color.b, dst.blue()),
        mix(255, dst.alpha()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn setup() -> (Layout, KeyboardRenderer, Palette) {
        let config = AppConfig::new();
        let layout = config.build_layout().unwrap();
        let origin = config.keyboard.origin(&config.display);
        let geometry = RenderGeometry {
            width: config.display.width,
            height: config.display.height,
            keyboard_area: Rect::new(origin.x, origin.y, config.keyboard.width, config.keyboard.height),
            key_rounding: config.keyboard.key_rounding,
            font_size: 18.0,
        };
        let renderer = KeyboardRenderer::new(geometry, config.palette).unwrap();
        (layout, renderer, config.palette)
    }

    fn pixel_at(renderer: &KeyboardRenderer, p: Point) -> (u8, u8, u8) {
        let px = renderer.pixmap().pixel(p.x as u32, p.y as u32).unwrap();
        (px.red(), px.green(), px.blue())
    }

    fn rgb(c: Rgb) -> (u8, u8, u8) {
        (c.r, c.g, c.b)
    }

    #[test]
    fn labels_are_upper_cased_single_characters() {
        assert_eq!(display_label("q"), "Q");
        assert_eq!(display_label(";"), ";");
        assert_eq!(display_label("backspace"), "backspace");
    }

    #[test]
    fn pressed_wins_over_hover() {
        let a = KeyId::new(1, 1);
        let view = RenderView {
            hover: Some(a),
            pressed: Some(a),
            ..RenderView::default()
        };
        assert_eq!(KeyVisual::for_key(a, &view), KeyVisual::Pressed);
        assert_eq!(KeyVisual::for_key(KeyId::new(0, 0), &view), KeyVisual::Normal);
    }

    #[test]
    fn scene_colours_follow_interaction_state() {
        let (layout, _, palette) = setup();
        let hover = layout.find_label("q").unwrap();
        let pressed = layout.find_label("w").unwrap();
        let view = RenderView {
            hover: Some(hover),
            pressed: Some(pressed),
            keyboard_visible: true,
            ..RenderView::default()
        };

        let scene = KeyboardScene::from_layout(&layout, &view, &palette);
        assert_eq!(scene.keys.len(), layout.len());
        assert_eq!(scene.key(hover).unwrap().fill, palette.key_hover);
        assert_eq!(scene.key(pressed).unwrap().fill, palette.key_pressed);
        assert_eq!(scene.key(pressed).unwrap().text_color, palette.text_hover);
        let other = layout.find_label("e").unwrap();
        assert_eq!(scene.key(other).unwrap().fill, palette.key_normal);
    }

    #[test]
    fn hidden_keyboard_has_no_keys() {
        let (layout, _, palette) = setup();
        let scene = KeyboardScene::from_layout(&layout, &RenderView::default(), &palette);
        assert!(scene.keys.is_empty());
        assert_eq!(scene.status, "FPS: 0.0");
    }

    #[test]
    fn renders_key_colours_into_pixels() {
        let (layout, mut renderer, palette) = setup();
        let hover = layout.find_label("g").unwrap();
        let view = RenderView {
            hover: Some(hover),
            keyboard_visible: true,
            ..RenderView::default()
        };
        renderer.render(&layout, &view).unwrap();

        let hover_center = layout.key(hover).unwrap().rect.center();
        assert_eq!(pixel_at(&renderer, hover_center), rgb(palette.key_hover));

        let normal_center = layout.key(layout.find_label("h").unwrap()).unwrap().rect.center();
        assert_eq!(pixel_at(&renderer, normal_center), rgb(palette.key_normal));
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn fingertip_marker_is_drawn() {
        let (layout, mut renderer, palette) = setup();
        let tip = Point::new(100, 100);
        let view = RenderView {
            fingertip: Some(tip),
            ..RenderView::default()
        };
        renderer.render(&layout, &view).unwrap();
        assert_eq!(pixel_at(&renderer, tip), rgb(palette.fingertip));
    }

    #[test]
    fn encodes_png() {
        let (layout, mut renderer, _) = setup();
        renderer.render(&layout, &RenderView::default()).unwrap();
        let png = renderer.encode_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn missing_font_file_is_reported() {
        let err = KeyboardRenderer::load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, RendererError::FontLoad { .. }));
    }

    #[test]
    fn zero_sized_pixmap_is_rejected() {
        let geometry = RenderGeometry {
            width: 0,
            height: 0,
            keyboard_area: Rect::new(0, 0, 0, 0),
            key_rounding: 0.0,
            font_size: 12.0,
        };
        assert!(matches!(
            KeyboardRenderer::new(geometry, Palette::default()),
            Err(RendererError::PixmapCreationFailed { .. })
        ));
    }

    #[test]
    fn blending_full_coverage_replaces_pixel() {
        let dst = PremultipliedColorU8::from_rgba(10, 10, 10, 255).unwrap();
        let out = blend(dst, Rgb::new(200, 100, 50), 1.0).unwrap();
        assert_eq!((out.red(), out.green(), out.blue(), out.alpha()), (200, 100, 50, 255));
    }
}
