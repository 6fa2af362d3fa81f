//! Layers: ordered, independently visible/lockable groups of operations

use crate::annotation::Operation;

/// Unique identifier for a layer
pub type LayerId = uuid::Uuid;

/// An ordered group of operations painted first-to-last
///
/// Layers are values. Every mutator returns a new layer with the same ID.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    id: LayerId,
    name: String,
    operations: Vec<Operation>,
    visible: bool,
    locked: bool,
    opacity: f32,
}

impl Layer {
    /// Create an empty, visible, unlocked, fully opaque layer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new_v4(),
            name: name.into(),
            operations: Vec::new(),
            visible: true,
            locked: false,
            opacity: 1.0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn with_operations(&self, operations: Vec<Operation>) -> Self {
        Self {
            operations,
            ..self.clone()
        }
    }

    pub fn adding_operation(&self, operation: Operation) -> Self {
        let mut layer = self.clone();
        layer.operations.push(operation);
        layer
    }

    pub fn with_visibility(&self, visible: bool) -> Self {
        Self {
            visible,
            ..self.clone()
        }
    }

    pub fn with_locked(&self, locked: bool) -> Self {
        Self {
            locked,
            ..self.clone()
        }
    }

    /// Opacity is clamped into `[0, 1]`; NaN becomes fully transparent
    pub fn with_opacity(&self, opacity: f32) -> Self {
        let opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        Self {
            opacity,
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// A fresh layer (new ID) carrying this layer's content and flags
    pub(crate) fn duplicate(&self, name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new_v4(),
            name: name.into(),
            ..self.clone()
        }
    }
}
