//! Annotation operations
//!
//! An [`Operation`] is one immutable annotation shape drawn over the captured
//! bitmap. Every transform (offset, resize, point append) returns a new value
//! carrying the same [`AnnotationId`]; the identifier is what tracks "the same
//! annotation" across edits and undo snapshots.

use std::sync::Arc;

use crate::geometry::{distance_to_segment, Bounds, Point};
use crate::manipulation::{self, ManipulationHandle, ResizeHandle};
use crate::renderer::{Renderer, Rgba, Stroke};

/// Unique identifier for an annotation
///
/// Generated using UUID v4 at creation time and preserved by every derived copy.
pub type AnnotationId = uuid::Uuid;

/// Default stroke width for line-like shapes
pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// Default font size for text annotations
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Maximum distance from an outline that still counts as a hit
pub const HIT_THRESHOLD: f32 = 10.0;

const ARROW_HEAD_LENGTH: f32 = 15.0;
const ARROW_HEAD_ANGLE: f32 = std::f32::consts::PI / 6.0;

// Estimated glyph metrics relative to the font size. The core has no font
// system, so text extents are approximated from these.
const TEXT_ADVANCE_RATIO: f32 = 0.6;
const TEXT_LINE_HEIGHT_RATIO: f32 = 1.2;

/// Annotation palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Color {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Black,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Black,
    ];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Blue => "Blue",
            Color::Green => "Green",
            Color::Yellow => "Yellow",
            Color::Black => "Black",
        }
    }

    /// Concrete paint value
    pub fn rgba(&self) -> Rgba {
        match self {
            Color::Red => Rgba::rgb(255, 59, 48),
            Color::Blue => Rgba::rgb(0, 122, 255),
            Color::Green => Rgba::rgb(52, 199, 89),
            Color::Yellow => Rgba::rgb(255, 204, 0),
            Color::Black => Rgba::rgb(0, 0, 0),
        }
    }
}

/// Immutable shape data of an annotation
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Shape {
    /// Straight segment from start to end
    Line {
        start: Point,
        end: Point,
        color: Color,
        width: f32,
    },

    /// Segment with an open arrowhead at the end point
    Arrow {
        start: Point,
        end: Point,
        color: Color,
        width: f32,
    },

    /// Outlined rectangle spanned by two diagonal corners
    Rectangle {
        start: Point,
        end: Point,
        color: Color,
        width: f32,
    },

    /// Opaque block hiding the region spanned by two diagonal corners
    Pixelate { start: Point, end: Point },

    /// Single line of text with its baseline origin at `position`
    Text {
        position: Point,
        text: String,
        color: Color,
        font_size: f32,
    },

    /// Freehand stroke through at least one point
    Pen {
        points: Vec<Point>,
        color: Color,
        width: f32,
    },
}

/// One annotation: stable identifier plus immutable shape
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Operation {
    id: AnnotationId,
    shape: Arc<Shape>,
}

impl Operation {
    /// Create a new operation with a generated ID
    pub fn new(shape: Shape) -> Self {
        Self::with_id(AnnotationId::new_v4(), shape)
    }

    /// Create an operation with a specific ID
    pub fn with_id(id: AnnotationId, shape: Shape) -> Self {
        Self {
            id,
            shape: Arc::new(shape),
        }
    }

    pub fn line(start: Point, end: Point, color: Color) -> Self {
        Self::new(Shape::Line {
            start,
            end,
            color,
            width: DEFAULT_STROKE_WIDTH,
        })
    }

    pub fn arrow(start: Point, end: Point, color: Color) -> Self {
        Self::new(Shape::Arrow {
            start,
            end,
            color,
            width: DEFAULT_STROKE_WIDTH,
        })
    }

    pub fn rectangle(start: Point, end: Point, color: Color) -> Self {
        Self::new(Shape::Rectangle {
            start,
            end,
            color,
            width: DEFAULT_STROKE_WIDTH,
        })
    }

    pub fn pixelate(start: Point, end: Point) -> Self {
        Self::new(Shape::Pixelate { start, end })
    }

    pub fn text(position: Point, text: impl Into<String>, color: Color) -> Self {
        Self::new(Shape::Text {
            position,
            text: text.into(),
            color,
            font_size: DEFAULT_FONT_SIZE,
        })
    }

    /// Freehand stroke starting at `first`
    pub fn pen(first: Point, color: Color) -> Self {
        Self::new(Shape::Pen {
            points: vec![first],
            color,
            width: DEFAULT_STROKE_WIDTH,
        })
    }

    /// Get the annotation ID
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// Get the shape (immutable reference)
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Derived copy with a new shape and the same ID
    fn derive(&self, shape: Shape) -> Self {
        Self {
            id: self.id,
            shape: Arc::new(shape),
        }
    }

    /// Append a point to a freehand stroke. Other shapes are returned unchanged.
    pub fn with_point(&self, point: Point) -> Self {
        match self.shape() {
            Shape::Pen {
                points,
                color,
                width,
            } => {
                let mut points = points.clone();
                points.push(point);
                self.derive(Shape::Pen {
                    points,
                    color: *color,
                    width: *width,
                })
            }
            _ => self.clone(),
        }
    }

    /// Axis-aligned bounding box of the shape's defining points
    pub fn bounds(&self) -> Bounds {
        match self.shape() {
            Shape::Line { start, end, .. }
            | Shape::Arrow { start, end, .. }
            | Shape::Rectangle { start, end, .. }
            | Shape::Pixelate { start, end } => Bounds::from_corners(*start, *end),
            Shape::Text {
                position,
                text,
                font_size,
                ..
            } => text_bounds(*position, text, *font_size),
            Shape::Pen { points, .. } => Bounds::from_points(points)
                .unwrap_or_else(|| Bounds::from_corners(Point::ZERO, Point::ZERO)),
        }
    }

    /// Hit test with the default threshold
    pub fn contains(&self, point: &Point) -> bool {
        self.contains_within(point, HIT_THRESHOLD)
    }

    /// Hit test
    ///
    /// Strokes hit within `threshold` of any segment. Rectangles hit only in a
    /// band of width `threshold` on either side of the outline; the interior
    /// is not a hit. Pixelate blocks and text hit anywhere inside their box.
    pub fn contains_within(&self, point: &Point, threshold: f32) -> bool {
        match self.shape() {
            Shape::Line { start, end, .. } | Shape::Arrow { start, end, .. } => {
                distance_to_segment(point, start, end) <= threshold
            }
            // A pen with fewer than two points has no segment to hit
            Shape::Pen { points, .. } => points
                .windows(2)
                .any(|w| distance_to_segment(point, &w[0], &w[1]) <= threshold),
            Shape::Rectangle { start, end, .. } => {
                let rect = Bounds::from_corners(*start, *end);
                let inside_outer = rect
                    .inset(-threshold)
                    .is_some_and(|outer| outer.contains(point));
                let inside_inner = rect
                    .inset(threshold)
                    .is_some_and(|inner| inner.contains(point));
                inside_outer && !inside_inner
            }
            Shape::Pixelate { .. } | Shape::Text { .. } => self.bounds().contains(point),
        }
    }

    /// Translate every point of the shape by `delta`
    pub fn offset(&self, delta: Point) -> Self {
        let shape = match self.shape() {
            Shape::Line {
                start,
                end,
                color,
                width,
            } => Shape::Line {
                start: *start + delta,
                end: *end + delta,
                color: *color,
                width: *width,
            },
            Shape::Arrow {
                start,
                end,
                color,
                width,
            } => Shape::Arrow {
                start: *start + delta,
                end: *end + delta,
                color: *color,
                width: *width,
            },
            Shape::Rectangle {
                start,
                end,
                color,
                width,
            } => Shape::Rectangle {
                start: *start + delta,
                end: *end + delta,
                color: *color,
                width: *width,
            },
            Shape::Pixelate { start, end } => Shape::Pixelate {
                start: *start + delta,
                end: *end + delta,
            },
            Shape::Text {
                position,
                text,
                color,
                font_size,
            } => Shape::Text {
                position: *position + delta,
                text: text.clone(),
                color: *color,
                font_size: *font_size,
            },
            Shape::Pen {
                points,
                color,
                width,
            } => Shape::Pen {
                points: points.iter().map(|p| *p + delta).collect(),
                color: *color,
                width: *width,
            },
        };
        self.derive(shape)
    }

    /// Handles available for resizing this shape
    ///
    /// Lines and arrows expose their endpoints; rectangles, pixelate blocks
    /// and freehand strokes expose eight box handles; text has none.
    pub fn resize_handles(&self) -> Vec<ManipulationHandle> {
        match self.shape() {
            Shape::Line { start, end, .. } | Shape::Arrow { start, end, .. } => {
                manipulation::endpoint_handles(*start, *end)
            }
            Shape::Rectangle { .. } | Shape::Pixelate { .. } | Shape::Pen { .. } => {
                manipulation::box_handles(&self.bounds())
            }
            Shape::Text { .. } => Vec::new(),
        }
    }

    /// Resize by dragging `handle` to `point`
    ///
    /// A freehand resize that would collapse the stroke's box to zero width or
    /// height is rejected and the operation is returned unchanged.
    pub fn resize(&self, handle: ResizeHandle, point: Point) -> Self {
        match self.shape() {
            Shape::Line {
                start,
                end,
                color,
                width,
            } => match handle {
                ResizeHandle::TopLeft => self.derive(Shape::Line {
                    start: point,
                    end: *end,
                    color: *color,
                    width: *width,
                }),
                ResizeHandle::BottomRight => self.derive(Shape::Line {
                    start: *start,
                    end: point,
                    color: *color,
                    width: *width,
                }),
                _ => self.clone(),
            },
            Shape::Arrow {
                start,
                end,
                color,
                width,
            } => match handle {
                ResizeHandle::TopLeft => self.derive(Shape::Arrow {
                    start: point,
                    end: *end,
                    color: *color,
                    width: *width,
                }),
                ResizeHandle::BottomRight => self.derive(Shape::Arrow {
                    start: *start,
                    end: point,
                    color: *color,
                    width: *width,
                }),
                _ => self.clone(),
            },
            Shape::Rectangle { color, width, .. } => {
                let (start, end) =
                    manipulation::resize_box_corners(&self.bounds(), handle, point);
                self.derive(Shape::Rectangle {
                    start,
                    end,
                    color: *color,
                    width: *width,
                })
            }
            Shape::Pixelate { .. } => {
                let (start, end) =
                    manipulation::resize_box_corners(&self.bounds(), handle, point);
                self.derive(Shape::Pixelate { start, end })
            }
            Shape::Pen {
                points,
                color,
                width,
            } => match manipulation::rescale_points(points, handle, point) {
                Some(points) => self.derive(Shape::Pen {
                    points,
                    color: *color,
                    width: *width,
                }),
                None => self.clone(),
            },
            Shape::Text { .. } => self.clone(),
        }
    }

    /// Paint the shape
    pub fn draw(&self, renderer: &mut dyn Renderer) {
        match self.shape() {
            Shape::Line {
                start,
                end,
                color,
                width,
            } => {
                renderer.stroke_path(&[*start, *end], stroke(*color, *width));
            }
            Shape::Arrow {
                start,
                end,
                color,
                width,
            } => {
                let stroke = stroke(*color, *width);
                renderer.stroke_path(&[*start, *end], stroke);
                let (left, right) = arrow_head(*start, *end);
                renderer.stroke_path(&[left, *end, right], stroke);
            }
            Shape::Rectangle {
                start,
                end,
                color,
                width,
            } => {
                let b = Bounds::from_corners(*start, *end);
                let outline = [
                    Point::new(b.min_x, b.min_y),
                    Point::new(b.max_x, b.min_y),
                    Point::new(b.max_x, b.max_y),
                    Point::new(b.min_x, b.max_y),
                    Point::new(b.min_x, b.min_y),
                ];
                renderer.stroke_path(&outline, stroke(*color, *width));
            }
            Shape::Pixelate { start, end } => {
                renderer.fill_rect(Bounds::from_corners(*start, *end), Color::Black.rgba());
            }
            Shape::Text {
                position,
                text,
                color,
                font_size,
            } => {
                renderer.draw_text(text, *position, *font_size, color.rgba());
            }
            Shape::Pen {
                points,
                color,
                width,
            } => {
                // A single point has nothing to stroke yet
                if points.len() >= 2 {
                    renderer.stroke_path(points, stroke(*color, *width));
                }
            }
        }
    }
}

fn stroke(color: Color, width: f32) -> Stroke {
    Stroke {
        color: color.rgba(),
        width,
    }
}

/// The two barb endpoints of an arrowhead at `end`
fn arrow_head(start: Point, end: Point) -> (Point, Point) {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let barb = |a: f32| {
        Point::new(
            end.x - ARROW_HEAD_LENGTH * a.cos(),
            end.y - ARROW_HEAD_LENGTH * a.sin(),
        )
    };
    (barb(angle - ARROW_HEAD_ANGLE), barb(angle + ARROW_HEAD_ANGLE))
}

/// Estimated rendered size of a single line of text
pub fn measure_text(text: &str, font_size: f32) -> (f32, f32) {
    let width = text.chars().count() as f32 * font_size * TEXT_ADVANCE_RATIO;
    let height = font_size * TEXT_LINE_HEIGHT_RATIO;
    (width, height)
}

fn text_bounds(position: Point, text: &str, font_size: f32) -> Bounds {
    let (width, height) = measure_text(text, font_size);
    Bounds {
        min_x: position.x,
        min_y: position.y - height,
        max_x: position.x + width,
        max_y: position.y,
    }
}
