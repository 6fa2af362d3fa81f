//! Renderer interface consumed by annotations and the document
//!
//! The core never paints pixels itself. It issues draw primitives against a
//! [`Renderer`], which a platform surface implements. [`DrawList`] is a
//! renderer-agnostic recording of those primitives.

use crate::geometry::{Bounds, Point};

/// Source bitmap type held by the document
pub type Bitmap = image::RgbaImage;

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert to normalized RGBA values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f32, f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }
}

/// Stroke parameters for path drawing. Caps and joins are always round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
}

/// Drawing surface
///
/// `save`/`restore` bracket state changes; `set_alpha` multiplies every
/// subsequent primitive's alpha until the matching `restore`.
pub trait Renderer {
    fn save(&mut self);
    fn restore(&mut self);
    fn set_alpha(&mut self, alpha: f32);
    fn draw_image(&mut self, image: &Bitmap);
    /// Stroke an open polyline through `path`
    fn stroke_path(&mut self, path: &[Point], stroke: Stroke);
    fn fill_rect(&mut self, rect: Bounds, color: Rgba);
    /// Fill the closed polygon through `path`
    fn fill_path(&mut self, path: &[Point], color: Rgba);
    /// Draw a single line of text with its baseline origin at `origin`
    fn draw_text(&mut self, text: &str, origin: Point, font_size: f32, color: Rgba);
}

/// One recorded draw primitive
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Image { width: u32, height: u32 },
    StrokePath { path: Vec<Point>, stroke: Stroke },
    FillRect { rect: Bounds, color: Rgba },
    FillPath { path: Vec<Point>, color: Rgba },
    Text { text: String, origin: Point, font_size: f32, color: Rgba },
}

/// A draw command with the effective alpha it was issued under
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub cmd: DrawCmd,
    pub alpha: f32,
}

/// Recorded draw stream
///
/// Alpha scopes are resolved at record time, so each item carries the
/// product of every `set_alpha` active when it was pushed.
#[derive(Debug, Clone)]
pub struct DrawList {
    items: Vec<DrawItem>,
    alpha: f32,
    saved: Vec<f32>,
}

impl Default for DrawList {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            alpha: 1.0,
            saved: Vec::new(),
        }
    }
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in paint order (back-to-front)
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clears recorded items and the state stack
    pub fn clear(&mut self) {
        self.items.clear();
        self.saved.clear();
        self.alpha = 1.0;
    }

    fn push(&mut self, cmd: DrawCmd) {
        self.items.push(DrawItem {
            cmd,
            alpha: self.alpha,
        });
    }
}

impl Renderer for DrawList {
    fn save(&mut self) {
        self.saved.push(self.alpha);
    }

    fn restore(&mut self) {
        debug_assert!(!self.saved.is_empty(), "restore called without matching save");
        if let Some(alpha) = self.saved.pop() {
            self.alpha = alpha;
        }
    }

    fn set_alpha(&mut self, alpha: f32) {
        let base = self.saved.last().copied().unwrap_or(1.0);
        self.alpha = base * alpha.clamp(0.0, 1.0);
    }

    fn draw_image(&mut self, image: &Bitmap) {
        self.push(DrawCmd::Image {
            width: image.width(),
            height: image.height(),
        });
    }

    fn stroke_path(&mut self, path: &[Point], stroke: Stroke) {
        self.push(DrawCmd::StrokePath {
            path: path.to_vec(),
            stroke,
        });
    }

    fn fill_rect(&mut self, rect: Bounds, color: Rgba) {
        self.push(DrawCmd::FillRect { rect, color });
    }

    fn fill_path(&mut self, path: &[Point], color: Rgba) {
        self.push(DrawCmd::FillPath {
            path: path.to_vec(),
            color,
        });
    }

    fn draw_text(&mut self, text: &str, origin: Point, font_size: f32, color: Rgba) {
        self.push(DrawCmd::Text {
            text: text.to_string(),
            origin,
            font_size,
            color,
        });
    }
}
