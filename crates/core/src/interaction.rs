//! Pointer gesture state machine
//!
//! [`InteractionController`] turns pointer-down/drag/up events into document
//! commands. With the select tool it grabs resize handles or moves existing
//! annotations through the document's move/resize transactions; with a
//! drawing tool it builds an in-progress [`Operation`] and hands it back on
//! pointer-up for the host to add.
//!
//! Text entry is asynchronous: pointer-up with the text tool yields a
//! [`TextRequest`] which the host answers later through
//! [`InteractionController::complete_text`]. A request is honoured only while
//! it is the pending one.

use log::{debug, trace};

use crate::annotation::{AnnotationId, Color, Operation, Shape};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::geometry::{Bounds, Point};
use crate::manipulation::ResizeHandle;
use crate::renderer::{Renderer, Rgba, Stroke};

const HANDLE_SIZE: f32 = 8.0;
const HANDLE_FILL: Rgba = Rgba::rgb(255, 255, 255);
const HANDLE_OUTLINE: Stroke = Stroke {
    color: Rgba::rgb(0, 0, 255),
    width: 2.0,
};

/// Active editing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Tool {
    Select,
    Pen,
    Line,
    Rectangle,
    Pixelate,
    Arrow,
    Text,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Select,
        Tool::Pen,
        Tool::Line,
        Tool::Rectangle,
        Tool::Pixelate,
        Tool::Arrow,
        Tool::Text,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Pen => "Pen",
            Tool::Line => "Line",
            Tool::Rectangle => "Rectangle",
            Tool::Pixelate => "Pixelate",
            Tool::Arrow => "Arrow",
            Tool::Text => "Text",
        }
    }

    /// True for every tool that creates annotations
    pub fn is_drawing(&self) -> bool {
        !matches!(self, Tool::Select)
    }
}

/// Observable phase of the current gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    /// A drawing tool is pressed
    Drawing,
    /// The select tool is pressed without holding an annotation
    Selecting,
    /// An annotation is being moved
    Dragging,
    /// An annotation is being resized by one of its handles
    Resizing,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Drawing { start: Point, tool: Tool },
    Selecting,
    Dragging { origin: Point, id: AnnotationId },
    Resizing { handle: ResizeHandle, id: AnnotationId },
}

/// Pending request for text input at an anchor
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub anchor: Point,
    pub color: Color,
    pub font_size: f32,
    token: u64,
}

/// Result of a pointer-up
#[derive(Debug, Clone, PartialEq)]
pub enum PointerUp {
    /// Nothing to report
    Nothing,
    /// A move or resize transaction was committed to the document
    Committed,
    /// A finished annotation, ready for [`Document::add_operation`]
    Created(Operation),
    /// The host should prompt for text and answer via `complete_text`
    TextRequested(TextRequest),
}

/// Pointer gesture controller
#[derive(Debug)]
pub struct InteractionController {
    tool: Tool,
    color: Color,

    hit_threshold: f32,
    handle_threshold: f32,
    stroke_width: f32,
    font_size: f32,

    gesture: Gesture,
    current: Option<Operation>,
    selected: Option<AnnotationId>,

    pending_text: Option<u64>,
    next_token: u64,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl InteractionController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            tool: Tool::Pen,
            color: config.default_color,
            hit_threshold: config.hit_threshold,
            handle_threshold: config.handle_threshold,
            stroke_width: config.stroke_width,
            font_size: config.font_size,
            gesture: Gesture::Idle,
            current: None,
            selected: None,
            pending_text: None,
            next_token: 0,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools. Takes effect from the next pointer-down.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn state(&self) -> GestureState {
        match self.gesture {
            Gesture::Idle => GestureState::Idle,
            Gesture::Drawing { .. } => GestureState::Drawing,
            Gesture::Selecting => GestureState::Selecting,
            Gesture::Dragging { .. } => GestureState::Dragging,
            Gesture::Resizing { .. } => GestureState::Resizing,
        }
    }

    pub fn selected_operation_id(&self) -> Option<AnnotationId> {
        self.selected
    }

    /// In-progress annotation being drawn
    pub fn current_operation(&self) -> Option<&Operation> {
        self.current.as_ref()
    }

    pub fn resizing_handle(&self) -> Option<ResizeHandle> {
        match self.gesture {
            Gesture::Resizing { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Offset of `point` from where the current drag started
    pub fn drag_offset(&self, point: Point) -> Option<Point> {
        match self.gesture {
            Gesture::Dragging { origin, .. } => Some(point - origin),
            _ => None,
        }
    }

    pub fn has_pending_text(&self) -> bool {
        self.pending_text.is_some()
    }

    pub fn pointer_down(&mut self, point: Point, document: &mut Document) {
        // The previous gesture never saw its pointer-up
        self.abandon_gesture(document);

        if self.tool.is_drawing() {
            self.selected = None;
            self.gesture = Gesture::Drawing {
                start: point,
                tool: self.tool,
            };
            return;
        }

        if let Some(handle) = self.hit_selected_handle(point, document) {
            if let Some(id) = self.selected {
                document.start_resizing_operation(id);
                if document.is_editing() {
                    debug!("resize {} by {:?}", id, handle);
                    self.gesture = Gesture::Resizing { handle, id };
                    return;
                }
            }
        }

        // Front-to-back: the most recently added annotation wins
        let hit = document
            .operations()
            .iter()
            .rev()
            .find(|op| op.contains_within(&point, self.hit_threshold))
            .map(Operation::id);

        self.selected = hit;
        self.gesture = Gesture::Selecting;
        if let Some(id) = hit {
            document.start_moving_operation(id);
            if document.is_editing() {
                debug!("move {}", id);
                self.gesture = Gesture::Dragging { origin: point, id };
            }
        }
    }

    fn hit_selected_handle(&self, point: Point, document: &Document) -> Option<ResizeHandle> {
        let id = self.selected?;
        let operation = document.operations().iter().find(|op| op.id() == id)?;
        operation
            .resize_handles()
            .into_iter()
            .find(|h| h.hit_test(&point, self.handle_threshold))
            .map(|h| h.handle)
    }

    pub fn pointer_drag(&mut self, point: Point, document: &mut Document) {
        match self.gesture {
            Gesture::Dragging { origin, id } => document.move_operation(id, point - origin),
            Gesture::Resizing { handle, id } => document.resize_operation(id, handle, point),
            Gesture::Drawing { start, tool } => self.update_drawing(start, tool, point),
            Gesture::Idle | Gesture::Selecting => {}
        }
    }

    fn update_drawing(&mut self, start: Point, tool: Tool, point: Point) {
        let color = self.color;
        let width = self.stroke_width;

        self.current = match tool {
            Tool::Pen => Some(match self.current.take() {
                Some(pen) => pen.with_point(point),
                None => Operation::new(Shape::Pen {
                    points: vec![start, point],
                    color,
                    width,
                }),
            }),
            Tool::Line => Some(Operation::new(Shape::Line {
                start,
                end: point,
                color,
                width,
            })),
            Tool::Arrow => Some(Operation::new(Shape::Arrow {
                start,
                end: point,
                color,
                width,
            })),
            Tool::Rectangle => Some(Operation::new(Shape::Rectangle {
                start,
                end: point,
                color,
                width,
            })),
            Tool::Pixelate => Some(Operation::pixelate(start, point)),
            Tool::Text | Tool::Select => None,
        };
        trace!("drawing {:?} to ({}, {})", tool, point.x, point.y);
    }

    pub fn pointer_up(&mut self, document: &mut Document) -> PointerUp {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let current = self.current.take();

        match gesture {
            Gesture::Dragging { .. } => {
                document.commit_move();
                PointerUp::Committed
            }
            Gesture::Resizing { .. } => {
                document.commit_resize();
                PointerUp::Committed
            }
            Gesture::Drawing {
                start,
                tool: Tool::Text,
            } => {
                self.next_token += 1;
                self.pending_text = Some(self.next_token);
                PointerUp::TextRequested(TextRequest {
                    anchor: start,
                    color: self.color,
                    font_size: self.font_size,
                    token: self.next_token,
                })
            }
            Gesture::Drawing { .. } => current.map_or(PointerUp::Nothing, PointerUp::Created),
            Gesture::Idle | Gesture::Selecting => PointerUp::Nothing,
        }
    }

    /// Answer a text request
    ///
    /// Returns the text annotation when `request` is still pending and `text`
    /// is non-empty. Stale requests and empty or absent text yield `None`.
    pub fn complete_text(&mut self, request: &TextRequest, text: Option<String>) -> Option<Operation> {
        if self.pending_text != Some(request.token) {
            debug!("ignoring stale text request {}", request.token);
            return None;
        }
        self.pending_text = None;

        let text = text.filter(|t| !t.is_empty())?;
        Some(Operation::new(Shape::Text {
            position: request.anchor,
            text,
            color: request.color,
            font_size: request.font_size,
        }))
    }

    /// Drop all transient gesture state and the selection
    ///
    /// No document command is issued; a live move or resize preview stays in
    /// the document until the host cancels it. See
    /// [`InteractionController::cancel_gesture`].
    pub fn cancel_operation(&mut self) {
        self.gesture = Gesture::Idle;
        self.current = None;
        self.selected = None;
        self.pending_text = None;
    }

    /// Like [`InteractionController::cancel_operation`], also rolling back
    /// any live move or resize in `document`
    pub fn cancel_gesture(&mut self, document: &mut Document) {
        self.abandon_gesture(document);
        self.cancel_operation();
    }

    fn abandon_gesture(&mut self, document: &mut Document) {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Dragging { .. } => document.cancel_move(),
            Gesture::Resizing { .. } => document.cancel_resize(),
            _ => {}
        }
        self.current = None;
    }

    /// Paint the in-progress annotation and the selected annotation's handles
    pub fn render_overlay(&self, document: &Document, renderer: &mut dyn Renderer) {
        if let Some(current) = &self.current {
            current.draw(renderer);
        }

        let Some(id) = self.selected else {
            return;
        };
        let Some(operation) = document.operations().iter().find(|op| op.id() == id) else {
            return;
        };

        renderer.save();
        let half = HANDLE_SIZE / 2.0;
        for handle in operation.resize_handles() {
            let p = handle.position;
            let rect = Bounds::from_corners(
                Point::new(p.x - half, p.y - half),
                Point::new(p.x + half, p.y + half),
            );
            renderer.fill_rect(rect, HANDLE_FILL);
            let outline = [
                Point::new(rect.min_x, rect.min_y),
                Point::new(rect.max_x, rect.min_y),
                Point::new(rect.max_x, rect.max_y),
                Point::new(rect.min_x, rect.max_y),
                Point::new(rect.min_x, rect.min_y),
            ];
            renderer.stroke_path(&outline, HANDLE_OUTLINE);
        }
        renderer.restore();
    }
}
