//! The editing session facade: one buffer plus its selection tracker.

use smol_str::SmolStr;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::buffer::AnnotatedBuffer;
use crate::error::EditError;
use crate::notify::{BufferObserver, ObserverId};
use crate::selection::SelectionTracker;

/// An editing session: the annotated buffer with its selection anchored.
///
/// Created when the editing session starts and alive for its whole
/// lifetime. The field editor is the single owner of the buffer; host
/// observers and the remote protocol reach the text only through it, by
/// offset.
pub struct FieldEditor {
    buffer: AnnotatedBuffer,
    tracker: SelectionTracker,
}

impl Default for FieldEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldEditor {
    /// Empty editor with the cursor at 0.
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Editor over `text` with the cursor at 0.
    pub fn from_text(text: &str) -> Self {
        let mut buffer = AnnotatedBuffer::from_text(text);
        let tracker = SelectionTracker::attach(&mut buffer);
        Self { buffer, tracker }
    }

    /// Read access to the underlying buffer.
    pub fn buffer(&self) -> &AnnotatedBuffer {
        &self.buffer
    }

    /// Mutable access to the underlying buffer, for host-side edits and
    /// annotation management outside the remote protocol.
    pub fn buffer_mut(&mut self) -> &mut AnnotatedBuffer {
        &mut self.buffer
    }

    // === Text ===

    /// Buffer length in code units.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Entire content as a `String`.
    pub fn text(&self) -> String {
        self.buffer.text()
    }

    /// Slice by code-unit range.
    pub fn slice(&self, start: usize, end: usize) -> Option<SmolStr> {
        self.buffer.slice(start, end)
    }

    /// Replace `start..end` with `text`; see
    /// [`AnnotatedBuffer::replace`] for the repositioning contract.
    pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<(), EditError> {
        self.buffer.replace(start, end, text)
    }

    // === Selection / composition ===

    pub fn selection(&self) -> (usize, usize) {
        self.tracker.selection(&self.buffer)
    }

    pub fn has_selection(&self) -> bool {
        self.tracker.has_selection(&self.buffer)
    }

    pub fn set_selection(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        self.tracker.set_selection(&mut self.buffer, start, end)
    }

    pub fn composing_region(&self) -> Option<(usize, usize)> {
        self.tracker.composing_region(&self.buffer)
    }

    pub fn set_composing_region(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        self.tracker
            .set_composing_region(&mut self.buffer, start, end)
    }

    pub fn clear_composing_region(&mut self) -> Result<(), EditError> {
        self.tracker.clear_composing_region(&mut self.buffer)
    }

    // === Annotations and observers (delegated) ===

    pub fn insert_annotation(&mut self, ann: Annotation) -> Result<AnnotationId, EditError> {
        self.buffer.insert_annotation(ann)
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> Result<Annotation, EditError> {
        self.buffer.remove_annotation(id)
    }

    pub fn query_annotations(
        &self,
        start: usize,
        end: usize,
        kind: Option<AnnotationKind>,
    ) -> Vec<AnnotationId> {
        self.buffer.query_annotations(start, end, kind)
    }

    pub fn register_observer(&mut self, observer: Box<dyn BufferObserver>) -> ObserverId {
        self.buffer.register_observer(observer)
    }

    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        self.buffer.unregister_observer(id)
    }
}
