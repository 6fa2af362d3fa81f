//! Document state model: layer stack, active layer and undo/redo history
//!
//! Every mutating command follows the same discipline: apply the change to
//! the layer stack, push a full snapshot of the resulting stack onto the undo
//! history, clear the redo history. The top of the undo history therefore
//! always mirrors the last committed state, and `undo` restores the entry
//! beneath it. The initial entry created by `set_image`/`clear` is never
//! popped.
//!
//! Precondition failures (unknown ids, locked layers, deleting the last
//! layer, empty histories) are silent no-ops.
//!
//! Interactive move/resize uses a two-phase protocol. `start_*` records the
//! original operation and its index; the per-frame calls replace that
//! operation in place without touching history; `commit_*` pushes exactly
//! one snapshot for the whole gesture, and `cancel_*` puts the original back.

use std::sync::Arc;

use log::{debug, trace};

use crate::annotation::{AnnotationId, Operation};
use crate::geometry::Point;
use crate::layer::{Layer, LayerId};
use crate::manipulation::ResizeHandle;
use crate::renderer::{Bitmap, Renderer};

const MERGED_LAYER_NAME: &str = "Merged Layer";
const FLATTENED_LAYER_NAME: &str = "Background";

/// Kind of interactive edit in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Move,
    Resize,
}

/// Saved original of the operation being moved or resized
#[derive(Debug, Clone)]
struct InFlightEdit {
    kind: EditKind,
    layer_id: LayerId,
    index: usize,
    original: Operation,
}

/// An annotated capture
#[derive(Debug, Default)]
pub struct Document {
    image: Option<Arc<Bitmap>>,

    /// Layer stack, first = topmost
    layers: Vec<Layer>,

    active_layer_id: Option<LayerId>,

    undo_stack: Vec<Vec<Layer>>,
    redo_stack: Vec<Vec<Layer>>,

    edit: Option<InFlightEdit>,

    /// Running counter for "Layer N" names
    layer_count: usize,
}

impl Document {
    /// Create an empty document with no image and no layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bitmap and reset to a single empty layer and fresh history
    pub fn set_image(&mut self, image: impl Into<Arc<Bitmap>>) {
        let image = image.into();
        debug!("set image {}x{}", image.width(), image.height());
        self.image = Some(image);
        self.reset();
    }

    /// Reset to a single empty layer and fresh history, keeping the bitmap
    pub fn clear(&mut self) {
        debug!("clear document");
        self.reset();
    }

    fn reset(&mut self) {
        self.layer_count = 1;
        let layer = Layer::new("Layer 1");
        self.active_layer_id = Some(layer.id());
        self.layers = vec![layer];
        self.undo_stack = vec![self.layers.clone()];
        self.redo_stack.clear();
        self.edit = None;
    }

    pub fn image(&self) -> Option<&Arc<Bitmap>> {
        self.image.as_ref()
    }

    /// Layer stack, first = topmost
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Index of the active layer, falling back to the topmost layer when the
    /// active id is unset or no longer exists
    fn active_layer_index(&self) -> Option<usize> {
        self.active_layer_id
            .and_then(|id| self.index_of(id))
            .or(if self.layers.is_empty() { None } else { Some(0) })
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active_layer_index().map(|i| &self.layers[i])
    }

    /// Effective active layer id (see [`Document::active_layer`])
    pub fn active_layer_id(&self) -> Option<LayerId> {
        self.active_layer().map(Layer::id)
    }

    /// Operations of the active layer
    pub fn operations(&self) -> &[Operation] {
        self.active_layer().map(Layer::operations).unwrap_or(&[])
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Kind of interactive edit currently in flight, if any
    pub fn editing(&self) -> Option<EditKind> {
        self.edit.as_ref().map(|e| e.kind)
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id() == id)
    }

    /// Push the current stack as a new undo entry and drop the redo history
    fn commit_history(&mut self) {
        self.undo_stack.push(self.layers.clone());
        self.redo_stack.clear();
        debug!(
            "history push: undo={} ops={}",
            self.undo_stack.len(),
            self.operations().len()
        );
    }

    fn retarget_active_layer(&mut self) {
        let stale = self
            .active_layer_id
            .is_some_and(|id| self.index_of(id).is_none());
        if stale {
            self.active_layer_id = self.layers.first().map(Layer::id);
        }
    }

    /// Replace the layer `id` with `f(layer)` and record history
    fn update_layer(&mut self, id: LayerId, f: impl FnOnce(&Layer) -> Layer) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        self.layers[index] = f(&self.layers[index]);
        self.commit_history();
    }

    // Layer management

    /// Insert a new empty layer on top and make it active
    pub fn add_layer(&mut self, name: Option<&str>) -> LayerId {
        self.layer_count += 1;
        let layer = match name {
            Some(name) => Layer::new(name),
            None => Layer::new(format!("Layer {}", self.layer_count)),
        };
        let id = layer.id();

        self.layers.insert(0, layer);
        self.active_layer_id = Some(id);
        self.commit_history();
        id
    }

    /// Remove a layer. The last remaining layer is never removed.
    pub fn delete_layer(&mut self, id: LayerId) {
        if self.layers.len() <= 1 {
            return;
        }
        let Some(index) = self.index_of(id) else {
            return;
        };

        self.layers.remove(index);
        self.retarget_active_layer();
        self.commit_history();
    }

    /// Copy a layer, insert the copy directly above it and make it active
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let index = self.index_of(id)?;
        self.layer_count += 1;
        let copy = self.layers[index].duplicate(format!("{} copy", self.layers[index].name()));
        let copy_id = copy.id();

        self.layers.insert(index, copy);
        self.active_layer_id = Some(copy_id);
        self.commit_history();
        Some(copy_id)
    }

    /// Move the layer at `from` so it ends up at index `to`
    pub fn move_layer(&mut self, from: usize, to: usize) {
        let len = self.layers.len();
        if from == to || from >= len || to >= len {
            return;
        }

        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.commit_history();
    }

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) {
        self.update_layer(id, |l| l.with_visibility(visible));
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) {
        self.update_layer(id, |l| l.with_locked(locked));
    }

    /// Set a layer's opacity, clamped into `[0, 1]`
    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) {
        self.update_layer(id, |l| l.with_opacity(opacity));
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) {
        self.update_layer(id, |l| l.with_name(name));
    }

    /// Make a layer active. Selection is not recorded in history.
    pub fn select_layer(&mut self, id: LayerId) {
        if self.index_of(id).is_some() {
            self.active_layer_id = Some(id);
        }
    }

    /// Combine all visible layers into one new layer on top
    ///
    /// Operations keep their bottom-to-top paint order. Requires at least two
    /// visible layers.
    pub fn merge_visible_layers(&mut self) {
        let visible = self.layers.iter().filter(|l| l.is_visible()).count();
        if visible < 2 {
            return;
        }

        let operations: Vec<Operation> = self
            .layers
            .iter()
            .rev()
            .filter(|l| l.is_visible())
            .flat_map(|l| l.operations().iter().cloned())
            .collect();

        self.layer_count += 1;
        let merged = Layer::new(MERGED_LAYER_NAME).with_operations(operations);
        let merged_id = merged.id();

        self.layers.retain(|l| !l.is_visible());
        self.layers.insert(0, merged);
        self.active_layer_id = Some(merged_id);
        self.commit_history();
    }

    /// Replace the whole stack with one layer holding every visible operation
    ///
    /// Hidden layers are discarded. Requires at least two layers.
    pub fn flatten_all_layers(&mut self) {
        if self.layers.len() < 2 {
            return;
        }

        let operations: Vec<Operation> = self
            .layers
            .iter()
            .rev()
            .filter(|l| l.is_visible())
            .flat_map(|l| l.operations().iter().cloned())
            .collect();

        let flattened = Layer::new(FLATTENED_LAYER_NAME).with_operations(operations);
        self.active_layer_id = Some(flattened.id());
        self.layers = vec![flattened];
        self.commit_history();
    }

    // Operation management

    /// Append an operation to the active layer unless it is locked
    pub fn add_operation(&mut self, operation: Operation) {
        let Some(index) = self.active_layer_index() else {
            return;
        };
        if self.layers[index].is_locked() {
            return;
        }

        self.layers[index] = self.layers[index].adding_operation(operation);
        self.commit_history();
    }

    fn start_edit(&mut self, kind: EditKind, id: AnnotationId) {
        let Some(layer_index) = self.active_layer_index() else {
            return;
        };
        let layer = &self.layers[layer_index];
        if layer.is_locked() {
            return;
        }
        let Some(index) = layer.operations().iter().position(|op| op.id() == id) else {
            return;
        };

        // A new gesture supersedes an abandoned one
        self.cancel_edit(None);

        let layer = &self.layers[layer_index];
        trace!("start {:?} of {} at index {}", kind, id, index);
        self.edit = Some(InFlightEdit {
            kind,
            layer_id: layer.id(),
            index,
            original: layer.operations()[index].clone(),
        });
    }

    /// Replace the in-flight operation with `f(original)` without recording history
    fn apply_edit(
        &mut self,
        kind: EditKind,
        id: AnnotationId,
        f: impl FnOnce(&Operation) -> Operation,
    ) {
        let Some(edit) = &self.edit else {
            return;
        };
        if edit.kind != kind || edit.original.id() != id {
            return;
        }
        let Some(layer_index) = self.index_of(edit.layer_id) else {
            return;
        };
        let layer = &self.layers[layer_index];
        if layer.operations().get(edit.index).map(Operation::id) != Some(id) {
            return;
        }

        let mut operations = layer.operations().to_vec();
        operations[edit.index] = f(&edit.original);
        self.layers[layer_index] = layer.with_operations(operations);
    }

    fn commit_edit(&mut self, kind: EditKind) {
        if self.editing() != Some(kind) {
            return;
        }
        self.edit = None;
        self.commit_history();
    }

    /// Restore the saved original and drop the in-flight edit
    ///
    /// `kind` restricts which edit may be cancelled; `None` cancels any.
    fn cancel_edit(&mut self, kind: Option<EditKind>) {
        let Some(edit) = self.edit.take() else {
            return;
        };
        if kind.is_some_and(|k| k != edit.kind) {
            self.edit = Some(edit);
            return;
        }

        let Some(layer_index) = self.index_of(edit.layer_id) else {
            return;
        };
        let layer = &self.layers[layer_index];
        if layer.operations().get(edit.index).map(Operation::id) != Some(edit.original.id()) {
            return;
        }
        let mut operations = layer.operations().to_vec();
        operations[edit.index] = edit.original;
        self.layers[layer_index] = layer.with_operations(operations);
    }

    pub fn start_moving_operation(&mut self, id: AnnotationId) {
        self.start_edit(EditKind::Move, id);
    }

    /// Live preview: place the operation at its original position offset by `delta`
    pub fn move_operation(&mut self, id: AnnotationId, delta: Point) {
        self.apply_edit(EditKind::Move, id, |original| original.offset(delta));
    }

    pub fn commit_move(&mut self) {
        self.commit_edit(EditKind::Move);
    }

    pub fn cancel_move(&mut self) {
        self.cancel_edit(Some(EditKind::Move));
    }

    pub fn start_resizing_operation(&mut self, id: AnnotationId) {
        self.start_edit(EditKind::Resize, id);
    }

    /// Live preview: the original operation resized by dragging `handle` to `point`
    pub fn resize_operation(&mut self, id: AnnotationId, handle: ResizeHandle, point: Point) {
        self.apply_edit(EditKind::Resize, id, |original| {
            original.resize(handle, point)
        });
    }

    pub fn commit_resize(&mut self) {
        self.commit_edit(EditKind::Resize);
    }

    pub fn cancel_resize(&mut self) {
        self.cancel_edit(Some(EditKind::Resize));
    }

    // Undo/redo

    /// Step back one history entry. The initial entry is never discarded.
    pub fn undo(&mut self) {
        if self.undo_stack.len() <= 1 {
            debug!("undo ignored: at initial state");
            return;
        }

        // An uncommitted preview never reaches history
        self.cancel_edit(None);
        self.redo_stack.push(std::mem::take(&mut self.layers));
        self.undo_stack.pop();
        if let Some(previous) = self.undo_stack.last() {
            self.layers = previous.clone();
        }
        self.retarget_active_layer();

        debug!(
            "undo: undo={} redo={} ops={}",
            self.undo_stack.len(),
            self.redo_stack.len(),
            self.operations().len()
        );
    }

    /// Re-apply the most recently undone entry
    pub fn redo(&mut self) {
        let Some(next) = self.redo_stack.pop() else {
            debug!("redo ignored: nothing to redo");
            return;
        };

        self.cancel_edit(None);
        self.layers = next.clone();
        self.undo_stack.push(next);
        self.retarget_active_layer();

        debug!(
            "redo: undo={} redo={} ops={}",
            self.undo_stack.len(),
            self.redo_stack.len(),
            self.operations().len()
        );
    }

    // Rendering

    /// Paint the bitmap and every visible layer, bottom layer first
    ///
    /// Each layer is drawn inside its own alpha scope at the layer's opacity.
    /// Returns `false` when no image is set.
    pub fn render_image(&self, renderer: &mut dyn Renderer) -> bool {
        let Some(image) = &self.image else {
            return false;
        };

        renderer.draw_image(image);
        for layer in self.layers.iter().rev().filter(|l| l.is_visible()) {
            renderer.save();
            renderer.set_alpha(layer.opacity());
            for operation in layer.operations() {
                operation.draw(renderer);
            }
            renderer.restore();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Color, Shape};
    use crate::renderer::{DrawCmd, DrawList};

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    fn doc() -> Document {
        let mut doc = Document::new();
        doc.set_image(Bitmap::new(200, 100));
        doc
    }

    fn line() -> Operation {
        Operation::line(p(0.0, 0.0), p(100.0, 100.0), Color::Red)
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert!(doc.image().is_none());
        assert!(doc.layers().is_empty());
        assert!(doc.operations().is_empty());
        assert!(!doc.can_undo());
        assert!(!doc.can_redo());
    }

    #[test]
    fn test_set_image_resets_state() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.add_layer(None);

        doc.set_image(Bitmap::new(10, 10));
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.layers()[0].name(), "Layer 1");
        assert_eq!(doc.undo_depth(), 1);
        assert_eq!(doc.redo_depth(), 0);
        assert_eq!(doc.active_layer_id(), Some(doc.layers()[0].id()));
    }

    #[test]
    fn test_draw_undo_redo() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());
        assert_eq!(doc.operations().len(), 1);

        doc.undo();
        assert_eq!(doc.operations().len(), 0);

        doc.redo();
        assert_eq!(doc.operations(), &[op]);
    }

    #[test]
    fn test_undo_steps_one_operation_at_a_time() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.add_operation(line());
        doc.add_operation(line());

        doc.undo();
        assert_eq!(doc.operations().len(), 2);
        doc.undo();
        assert_eq!(doc.operations().len(), 1);
        doc.redo();
        assert_eq!(doc.operations().len(), 2);
    }

    #[test]
    fn test_undo_never_drops_base_state() {
        let mut doc = doc();
        doc.add_operation(line());
        for _ in 0..5 {
            doc.undo();
            assert!(doc.undo_depth() >= 1);
        }
        assert!(!doc.can_undo());
        assert_eq!(doc.layers().len(), 1);
    }

    #[test]
    fn test_redo_with_empty_history_is_noop() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.redo();
        assert_eq!(doc.operations().len(), 1);
        assert_eq!(doc.undo_depth(), 2);
    }

    #[test]
    fn test_mutation_clears_redo() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.undo();
        assert!(doc.can_redo());

        doc.add_operation(line());
        assert!(!doc.can_redo());
    }

    #[test]
    fn test_add_layer_goes_on_top_and_becomes_active() {
        let mut doc = doc();
        let id = doc.add_layer(None);
        assert_eq!(doc.layers().len(), 2);
        assert_eq!(doc.layers()[0].id(), id);
        assert_eq!(doc.layers()[0].name(), "Layer 2");
        assert_eq!(doc.active_layer_id(), Some(id));

        let named = doc.add_layer(Some("Notes"));
        assert_eq!(doc.layer(named).unwrap().name(), "Notes");
    }

    #[test]
    fn test_cannot_delete_last_layer() {
        let mut doc = doc();
        let id = doc.layers()[0].id();
        doc.delete_layer(id);
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.undo_depth(), 1);
    }

    #[test]
    fn test_delete_active_layer_retargets() {
        let mut doc = doc();
        let bottom = doc.layers()[0].id();
        let top = doc.add_layer(None);
        doc.select_layer(top);

        doc.delete_layer(top);
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.active_layer_id(), Some(bottom));
    }

    #[test]
    fn test_undo_retargets_removed_active_layer() {
        let mut doc = doc();
        let bottom = doc.layers()[0].id();
        doc.add_layer(None);

        doc.undo();
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.active_layer_id(), Some(bottom));
    }

    #[test]
    fn test_duplicate_layer_inserts_above_source() {
        let mut doc = doc();
        let source = doc.layers()[0].id();
        doc.add_operation(line());
        doc.set_layer_opacity(source, 0.5);

        let copy = doc.duplicate_layer(source).unwrap();
        assert_eq!(doc.layers().len(), 2);
        assert_eq!(doc.layers()[0].id(), copy);
        assert_eq!(doc.layers()[1].id(), source);

        let copy_layer = doc.layer(copy).unwrap();
        assert_eq!(copy_layer.name(), "Layer 1 copy");
        assert_eq!(copy_layer.operations().len(), 1);
        assert_eq!(copy_layer.opacity(), 0.5);
        assert_eq!(doc.active_layer_id(), Some(copy));

        assert!(doc.duplicate_layer(LayerId::new_v4()).is_none());
    }

    #[test]
    fn test_move_layer() {
        let mut doc = doc();
        let bottom = doc.layers()[0].id();
        let top = doc.add_layer(None);

        doc.move_layer(0, 1);
        assert_eq!(doc.layers()[0].id(), bottom);
        assert_eq!(doc.layers()[1].id(), top);

        let depth = doc.undo_depth();
        doc.move_layer(0, 5);
        doc.move_layer(1, 1);
        assert_eq!(doc.undo_depth(), depth);
    }

    #[test]
    fn test_layer_property_commands() {
        let mut doc = doc();
        let id = doc.layers()[0].id();

        doc.set_layer_visibility(id, false);
        assert!(!doc.layer(id).unwrap().is_visible());

        doc.rename_layer(id, "Base");
        assert_eq!(doc.layer(id).unwrap().name(), "Base");

        doc.set_layer_opacity(id, 1.7);
        assert_eq!(doc.layer(id).unwrap().opacity(), 1.0);
        doc.set_layer_opacity(id, -0.3);
        assert_eq!(doc.layer(id).unwrap().opacity(), 0.0);

        assert_eq!(doc.undo_depth(), 5);
    }

    #[test]
    fn test_unknown_layer_is_noop() {
        let mut doc = doc();
        let ghost = LayerId::new_v4();
        doc.set_layer_visibility(ghost, false);
        doc.rename_layer(ghost, "x");
        doc.delete_layer(ghost);
        doc.select_layer(ghost);
        assert_eq!(doc.undo_depth(), 1);
        assert_ne!(doc.active_layer_id(), Some(ghost));
    }

    #[test]
    fn test_select_layer_does_not_touch_history() {
        let mut doc = doc();
        let bottom = doc.layers()[0].id();
        doc.add_layer(None);
        let depth = doc.undo_depth();

        doc.select_layer(bottom);
        assert_eq!(doc.active_layer_id(), Some(bottom));
        assert_eq!(doc.undo_depth(), depth);
    }

    #[test]
    fn test_locked_layer_rejects_operations() {
        let mut doc = doc();
        let id = doc.layers()[0].id();
        doc.set_layer_locked(id, true);

        doc.add_operation(line());
        assert!(doc.operations().is_empty());
    }

    #[test]
    fn test_merge_visible_layers_keeps_paint_order() {
        let mut doc = doc();
        let bottom_op = line();
        doc.add_operation(bottom_op.clone());

        doc.add_layer(None);
        let top_a = Operation::pixelate(p(0.0, 0.0), p(5.0, 5.0));
        let top_b = Operation::text(p(1.0, 1.0), "hi", Color::Blue);
        doc.add_operation(top_a.clone());
        doc.add_operation(top_b.clone());

        doc.merge_visible_layers();
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.layers()[0].name(), "Merged Layer");
        assert_eq!(doc.operations(), &[bottom_op, top_a, top_b]);
    }

    #[test]
    fn test_merge_leaves_hidden_layers() {
        let mut doc = doc();
        let hidden = doc.layers()[0].id();
        doc.add_operation(line());
        doc.set_layer_visibility(hidden, false);
        doc.add_layer(None);
        doc.add_layer(None);

        doc.merge_visible_layers();
        assert_eq!(doc.layers().len(), 2);
        assert_eq!(doc.layers()[0].name(), "Merged Layer");
        assert_eq!(doc.layers()[1].id(), hidden);
    }

    #[test]
    fn test_merge_requires_two_visible_layers() {
        let mut doc = doc();
        let hidden = doc.layers()[0].id();
        doc.set_layer_visibility(hidden, false);
        doc.add_layer(None);
        let depth = doc.undo_depth();

        doc.merge_visible_layers();
        assert_eq!(doc.layers().len(), 2);
        assert_eq!(doc.undo_depth(), depth);
    }

    #[test]
    fn test_flatten_skips_hidden_layers() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.add_layer(None);
        doc.add_operation(line());
        let hidden = doc.add_layer(None);
        doc.add_operation(line());
        doc.set_layer_visibility(hidden, false);

        doc.flatten_all_layers();
        assert_eq!(doc.layers().len(), 1);
        assert_eq!(doc.layers()[0].name(), "Background");
        assert_eq!(doc.operations().len(), 2);
    }

    #[test]
    fn test_flatten_single_layer_is_noop() {
        let mut doc = doc();
        let id = doc.layers()[0].id();
        doc.flatten_all_layers();
        assert_eq!(doc.layers()[0].id(), id);
        assert_eq!(doc.undo_depth(), 1);
    }

    #[test]
    fn test_move_commit_undo_redo() {
        let mut doc = doc();
        let op = line();
        let id = op.id();
        doc.add_operation(op.clone());

        doc.start_moving_operation(id);
        assert_eq!(doc.editing(), Some(EditKind::Move));
        doc.move_operation(id, p(5.0, 5.0));
        doc.move_operation(id, p(10.0, 20.0));
        let depth = doc.undo_depth();
        doc.commit_move();
        assert_eq!(doc.undo_depth(), depth + 1);
        assert_eq!(doc.editing(), None);

        let moved = op.offset(p(10.0, 20.0));
        assert_eq!(doc.operations(), &[moved.clone()]);

        doc.undo();
        assert_eq!(doc.operations(), &[op]);
        doc.redo();
        assert_eq!(doc.operations(), &[moved]);
    }

    #[test]
    fn test_live_move_does_not_touch_history() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());
        let depth = doc.undo_depth();

        doc.start_moving_operation(op.id());
        doc.move_operation(op.id(), p(1.0, 1.0));
        doc.move_operation(op.id(), p(2.0, 2.0));
        assert_eq!(doc.undo_depth(), depth);
    }

    #[test]
    fn test_cancel_move_restores_original() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());
        let depth = doc.undo_depth();

        doc.start_moving_operation(op.id());
        for i in 0..10 {
            doc.move_operation(op.id(), p(i as f32, -(i as f32)));
        }
        doc.cancel_move();

        assert_eq!(doc.operations(), &[op]);
        assert_eq!(doc.undo_depth(), depth);
        assert_eq!(doc.editing(), None);
    }

    #[test]
    fn test_cancel_resize_restores_original() {
        let mut doc = doc();
        let op = Operation::rectangle(p(0.0, 0.0), p(50.0, 50.0), Color::Green);
        doc.add_operation(op.clone());

        doc.start_resizing_operation(op.id());
        doc.resize_operation(op.id(), ResizeHandle::BottomRight, p(90.0, -10.0));
        doc.resize_operation(op.id(), ResizeHandle::BottomRight, p(120.0, -40.0));
        assert_ne!(doc.operations()[0], op);

        doc.cancel_resize();
        assert_eq!(doc.operations(), &[op]);
    }

    #[test]
    fn test_undo_during_live_move_discards_preview() {
        let mut doc = doc();
        let a = Operation::line(p(0.0, 0.0), p(10.0, 10.0), Color::Red);
        let b = Operation::line(p(20.0, 20.0), p(30.0, 30.0), Color::Blue);
        doc.add_operation(a.clone());
        doc.add_operation(b.clone());

        doc.start_moving_operation(a.id());
        doc.move_operation(a.id(), p(50.0, 50.0));
        doc.undo();
        assert_eq!(doc.operations(), &[a.clone()]);
        assert!(!doc.is_editing());

        doc.redo();
        assert_eq!(doc.operations(), &[a, b]);
    }

    #[test]
    fn test_redo_during_live_resize_discards_preview() {
        let mut doc = doc();
        let a = Operation::rectangle(p(0.0, 0.0), p(50.0, 50.0), Color::Green);
        let b = line();
        doc.add_operation(a.clone());
        doc.add_operation(b.clone());
        doc.undo();

        doc.start_resizing_operation(a.id());
        doc.resize_operation(a.id(), ResizeHandle::BottomRight, p(90.0, -10.0));
        doc.redo();
        assert_eq!(doc.operations(), &[a.clone(), b]);
        assert!(!doc.is_editing());

        doc.undo();
        assert_eq!(doc.operations(), &[a]);
    }

    #[test]
    fn test_nan_opacity_is_stored_in_range() {
        let mut doc = doc();
        let id = doc.layers()[0].id();
        doc.set_layer_opacity(id, f32::NAN);
        assert_eq!(doc.layers()[0].opacity(), 0.0);
    }

    #[test]
    fn test_resize_commit() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());

        doc.start_resizing_operation(op.id());
        doc.resize_operation(op.id(), ResizeHandle::TopLeft, p(-10.0, -10.0));
        doc.commit_resize();

        match doc.operations()[0].shape() {
            Shape::Line { start, .. } => assert_eq!(*start, p(-10.0, -10.0)),
            other => panic!("Expected Line, got {:?}", other),
        }
        doc.undo();
        assert_eq!(doc.operations(), &[op]);
    }

    #[test]
    fn test_start_edit_refused_on_locked_layer() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());
        let layer = doc.layers()[0].id();
        doc.set_layer_locked(layer, true);

        doc.start_moving_operation(op.id());
        assert_eq!(doc.editing(), None);
        doc.move_operation(op.id(), p(10.0, 10.0));
        assert_eq!(doc.operations(), &[op]);
    }

    #[test]
    fn test_start_edit_unknown_operation() {
        let mut doc = doc();
        doc.start_resizing_operation(AnnotationId::new_v4());
        assert_eq!(doc.editing(), None);

        let depth = doc.undo_depth();
        doc.commit_resize();
        assert_eq!(doc.undo_depth(), depth);
    }

    #[test]
    fn test_mismatched_edit_calls_are_ignored() {
        let mut doc = doc();
        let op = line();
        doc.add_operation(op.clone());

        doc.start_moving_operation(op.id());
        doc.resize_operation(op.id(), ResizeHandle::TopLeft, p(50.0, 50.0));
        assert_eq!(doc.operations(), &[op.clone()]);

        let depth = doc.undo_depth();
        doc.commit_resize();
        assert_eq!(doc.undo_depth(), depth);
        assert_eq!(doc.editing(), Some(EditKind::Move));
    }

    #[test]
    fn test_clear_resets_history() {
        let mut doc = doc();
        doc.add_operation(line());
        doc.add_layer(None);
        doc.undo();

        doc.clear();
        assert!(doc.image().is_some());
        assert_eq!(doc.layers().len(), 1);
        assert!(doc.operations().is_empty());
        assert_eq!(doc.undo_depth(), 1);
        assert!(!doc.can_redo());
    }

    #[test]
    fn test_render_requires_image() {
        let doc = Document::new();
        let mut list = DrawList::new();
        assert!(!doc.render_image(&mut list));
        assert!(list.is_empty());
    }

    #[test]
    fn test_render_paints_bottom_layer_first() {
        let mut doc = doc();
        let bottom_id = doc.layers()[0].id();
        doc.add_operation(Operation::pixelate(p(0.0, 0.0), p(5.0, 5.0)));
        doc.set_layer_opacity(bottom_id, 0.5);

        let top_id = doc.add_layer(None);
        doc.add_operation(line());

        let hidden = doc.add_layer(None);
        doc.add_operation(line());
        doc.set_layer_visibility(hidden, false);

        let mut list = DrawList::new();
        assert!(doc.render_image(&mut list));

        let items = list.items();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0].cmd, DrawCmd::Image { width: 200, height: 100 }));
        assert!(matches!(items[1].cmd, DrawCmd::FillRect { .. }));
        assert_eq!(items[1].alpha, 0.5);
        assert!(matches!(items[2].cmd, DrawCmd::StrokePath { .. }));
        assert_eq!(items[2].alpha, 1.0);
        assert!(doc.layer(top_id).is_some());
    }
}
