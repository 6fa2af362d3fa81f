//! Capture & Edit Core Library
//!
//! Annotation editing core for the screen-capture editor: annotation shapes,
//! layers, the document with snapshot undo/redo, and the pointer gesture
//! controller.

pub mod annotation;
pub mod config;
pub mod document;
pub mod geometry;
pub mod interaction;
pub mod layer;
pub mod logging;
pub mod manipulation;
pub mod renderer;

pub use annotation::{measure_text, AnnotationId, Color, Operation, Shape};
pub use config::{ConfigError, EditorConfig};
pub use document::{Document, EditKind};
pub use geometry::{distance_to_segment, Bounds, Point};
pub use interaction::{GestureState, InteractionController, PointerUp, TextRequest, Tool};
pub use layer::{Layer, LayerId};
pub use logging::{init_logging, LoggingConfig};
pub use manipulation::{ManipulationHandle, ResizeHandle};
pub use renderer::{Bitmap, DrawCmd, DrawItem, DrawList, Renderer, Rgba, Stroke};
