//! Selection and composing-region tracking.
//!
//! The selection is a pair of zero-width anchor annotations whose boundary
//! flags make the cursor ride along behind inserted text; the composing
//! region is a single ranged annotation. Both live in the buffer and are
//! repositioned by the same rule as every other annotation, so every
//! tracker call below routes through the change notifier exactly like a
//! text edit does.

use tracing::trace;

use crate::annotation::{Annotation, AnnotationId};
use crate::buffer::AnnotatedBuffer;
use crate::error::EditError;

/// Tracks the selection anchors and the composing region of one buffer.
///
/// Exactly one selection exists per buffer for the session's lifetime; at
/// most one composing region exists at a time, and setting a new one
/// replaces the previous instance.
pub struct SelectionTracker {
    start_id: AnnotationId,
    end_id: AnnotationId,
    composing_id: Option<AnnotationId>,
}

impl SelectionTracker {
    /// Anchor a fresh selection at offset 0 in `buf`.
    pub(crate) fn attach(buf: &mut AnnotatedBuffer) -> Self {
        let start_id = buf.insert_annotation_inner(Annotation::selection_start(0));
        let end_id = buf.insert_annotation_inner(Annotation::selection_end(0));
        Self {
            start_id,
            end_id,
            composing_id: None,
        }
    }

    /// Current selection as `(start, end)` in code units.
    pub fn selection(&self, buf: &AnnotatedBuffer) -> (usize, usize) {
        let start = buf.annotation(self.start_id).map_or(0, |a| a.start);
        let end = buf.annotation(self.end_id).map_or(0, |a| a.start);
        (start, end)
    }

    /// True iff the selection spans at least one code unit.
    pub fn has_selection(&self, buf: &AnnotatedBuffer) -> bool {
        let (start, end) = self.selection(buf);
        start != end
    }

    /// Move the selection anchors. Out-of-range offsets are clamped, never
    /// rejected; setting the value already in place is an idempotent no-op
    /// that fires no annotation callbacks.
    pub fn set_selection(
        &self,
        buf: &mut AnnotatedBuffer,
        start: usize,
        end: usize,
    ) -> Result<(), EditError> {
        let len = buf.len();
        let start = buf.snap(start.min(len));
        let end = buf.snap(end.min(len));
        trace!(target: "etch::buffer", start, end, "set selection");
        buf.move_annotation(self.start_id, start, start)?;
        buf.move_annotation(self.end_id, end, end)?;
        Ok(())
    }

    /// Current composing region, if any.
    pub fn composing_region(&self, buf: &AnnotatedBuffer) -> Option<(usize, usize)> {
        let ann = self.composing_id.and_then(|id| buf.annotation(id))?;
        Some((ann.start, ann.end))
    }

    /// Mark `start..end` as the composing region, replacing any previous
    /// one. Reversed bounds are swapped and out-of-range bounds clamped
    /// (the remote peer is not trusted to send valid ranges). An empty
    /// range after clamping clears the region instead.
    pub fn set_composing_region(
        &mut self,
        buf: &mut AnnotatedBuffer,
        start: usize,
        end: usize,
    ) -> Result<(), EditError> {
        let len = buf.len();
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        let start = buf.snap(start.min(len));
        let end = buf.snap(end.min(len));
        self.clear_composing_region(buf)?;
        if start == end {
            return Ok(());
        }
        trace!(target: "etch::buffer", start, end, "set composing region");
        let id = buf.insert_annotation(Annotation::composing(start, end))?;
        self.composing_id = Some(id);
        Ok(())
    }

    /// Drop the composing region without touching buffer content.
    pub fn clear_composing_region(&mut self, buf: &mut AnnotatedBuffer) -> Result<(), EditError> {
        if let Some(id) = self.composing_id.take() {
            // The annotation may already be gone if the host removed it.
            match buf.remove_annotation(id) {
                Ok(_) | Err(EditError::UnknownAnnotation(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
