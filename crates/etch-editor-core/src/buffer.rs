//! The annotated text buffer.
//!
//! A ropey-backed character sequence plus an ordered set of annotations that
//! are repositioned on every edit. All public offsets are UTF-16 code units,
//! the unit the input-method protocol speaks; conversion to the rope's char
//! indices happens at the boundary. Offsets addressing the interior of a
//! surrogate pair snap to the start of the containing scalar value before
//! any repositioning math runs.

use ropey::Rope;
use smol_str::{SmolStr, ToSmolStr};
use tracing::trace;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, Boundary};
use crate::error::EditError;
use crate::notify::{BufferObserver, ObserverId};

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

struct Entry {
    id: AnnotationId,
    ann: Annotation,
}

/// Character buffer with attached annotations and registered observers.
///
/// Owned exclusively by the editing session; everything else refers into it
/// by offset. Mutations are small and synchronous, and every one notifies
/// observers in the three-phase order documented in [`crate::notify`].
pub struct AnnotatedBuffer {
    rope: Rope,
    entries: Vec<Entry>,
    observers: Vec<(ObserverId, Box<dyn BufferObserver>)>,
    next_annotation: u64,
    next_observer: u64,
    notifying: bool,
}

impl Default for AnnotatedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotatedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            entries: Vec::new(),
            observers: Vec::new(),
            next_annotation: 0,
            next_observer: 0,
            notifying: false,
        }
    }

    /// Create a buffer holding `text`, with no annotations.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            ..Self::new()
        }
    }

    // === Read surface ===

    /// Total length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.rope.len_utf16_cu()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Total length in chars (Unicode scalar values).
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Entire buffer as a `String`.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Slice by code-unit range. Returns `None` if the range is invalid.
    /// Offsets inside a surrogate pair snap to the containing scalar value.
    pub fn slice(&self, start: usize, end: usize) -> Option<SmolStr> {
        if start > end || end > self.len() {
            return None;
        }
        let cs = self.rope.utf16_cu_to_char(start);
        let ce = self.rope.utf16_cu_to_char(end);
        Some(self.rope.slice(cs..ce).to_smolstr())
    }

    /// Scalar value containing the given code-unit offset, if in bounds.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset >= self.len() {
            return None;
        }
        Some(self.rope.char(self.rope.utf16_cu_to_char(offset)))
    }

    /// Convert a code-unit offset to a char offset, clamping to the buffer.
    pub fn code_unit_to_char(&self, offset: usize) -> usize {
        self.rope.utf16_cu_to_char(offset.min(self.len()))
    }

    /// Convert a char offset to a code-unit offset, clamping to the buffer.
    pub fn char_to_code_unit(&self, char_offset: usize) -> usize {
        self.rope.char_to_utf16_cu(char_offset.min(self.rope.len_chars()))
    }

    /// Snap a code-unit offset to the start of its containing scalar value,
    /// clamping to the buffer length.
    pub fn snap(&self, offset: usize) -> usize {
        let ch = self.rope.utf16_cu_to_char(offset.min(self.len()));
        self.rope.char_to_utf16_cu(ch)
    }

    // === Mutation ===

    /// Atomically delete `start..end` and insert `text`, then reposition
    /// every annotation.
    ///
    /// Per annotation endpoint: an offset before `start` is unchanged; an
    /// offset past the original `end` shifts by the net length change; an
    /// offset within the replaced range collapses to `start`, except that a
    /// boundary sitting exactly at `start` or at the original `end` extends
    /// past the inserted text when its flag says the insertion belongs
    /// inside the annotation.
    ///
    /// Fails with [`EditError::OutOfRange`] for an inverted or out-of-bounds
    /// range and [`EditError::ReentrantMutation`] when called from inside an
    /// observer callback.
    pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<(), EditError> {
        self.ensure_not_notifying()?;
        let len = self.len();
        if start > end || end > len {
            return Err(EditError::OutOfRange { start, end, len });
        }
        let start = self.snap(start);
        let end = self.snap(end);
        let old_len = end - start;
        let new_len = utf16_len(text);
        trace!(target: "etch::buffer", start, end, new_len, "replace");

        self.dispatch(|obs, buf| obs.before_replace(buf, start, end, new_len));

        let cs = self.rope.utf16_cu_to_char(start);
        let ce = self.rope.utf16_cu_to_char(end);
        self.rope.remove(cs..ce);
        self.rope.insert(cs, text);

        let mut moves: Vec<(AnnotationId, usize, usize)> = Vec::new();
        for entry in &mut self.entries {
            let (old_start, old_end) = (entry.ann.start, entry.ann.end);
            let new_start = reposition(
                old_start,
                Side::Start,
                entry.ann.start_boundary,
                start,
                end,
                new_len,
            );
            let new_end = reposition(
                old_end,
                Side::End,
                entry.ann.end_boundary,
                start,
                end,
                new_len,
            );
            // A contradictory flag pair on a zero-width annotation can
            // invert the range; the start endpoint's resolution wins.
            let new_end = new_end.max(new_start);
            if new_start != old_start || new_end != old_end {
                entry.ann.start = new_start;
                entry.ann.end = new_end;
                moves.push((entry.id, old_start, old_end));
            }
        }
        for (id, old_start, old_end) in moves {
            self.dispatch(|obs, buf| obs.annotation_moved(buf, id, old_start, old_end));
        }

        self.dispatch(|obs, buf| obs.after_replace(buf, start, old_len, new_len));
        Ok(())
    }

    // === Annotations ===

    /// Attach an annotation, clamping its range into the buffer. Returns a
    /// handle for later moves or removal.
    pub fn insert_annotation(&mut self, ann: Annotation) -> Result<AnnotationId, EditError> {
        self.ensure_not_notifying()?;
        Ok(self.insert_annotation_inner(ann))
    }

    pub(crate) fn insert_annotation_inner(&mut self, mut ann: Annotation) -> AnnotationId {
        let (start, end) = self.normalize_range(ann.start, ann.end);
        ann.start = start;
        ann.end = end;
        let id = AnnotationId(self.next_annotation);
        self.next_annotation += 1;
        self.entries.push(Entry { id, ann });
        self.dispatch(|obs, buf| obs.annotation_added(buf, id));
        id
    }

    /// Detach an annotation, returning its final state.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> Result<Annotation, EditError> {
        self.ensure_not_notifying()?;
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(EditError::UnknownAnnotation(id))?;
        let ann = self.entries.remove(idx).ann;
        self.dispatch(|obs, buf| obs.annotation_removed(buf, &ann));
        Ok(ann)
    }

    /// Move an annotation to a new range, clamped into the buffer. Moving
    /// an annotation to the range it already occupies is a no-op that fires
    /// no callbacks.
    pub fn move_annotation(
        &mut self,
        id: AnnotationId,
        start: usize,
        end: usize,
    ) -> Result<(), EditError> {
        self.ensure_not_notifying()?;
        let (start, end) = self.normalize_range(start, end);
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EditError::UnknownAnnotation(id))?;
        let (old_start, old_end) = (entry.ann.start, entry.ann.end);
        if (old_start, old_end) == (start, end) {
            return Ok(());
        }
        entry.ann.start = start;
        entry.ann.end = end;
        self.dispatch(|obs, buf| obs.annotation_moved(buf, id, old_start, old_end));
        Ok(())
    }

    /// Look up an annotation by handle.
    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.ann)
    }

    /// Iterate over all annotations in insertion order.
    pub fn annotations(&self) -> impl Iterator<Item = (AnnotationId, &Annotation)> {
        self.entries.iter().map(|e| (e.id, &e.ann))
    }

    /// Annotations touching `start..end`, optionally filtered by kind,
    /// ordered by priority (highest first) then insertion order.
    pub fn query_annotations(
        &self,
        start: usize,
        end: usize,
        kind: Option<AnnotationKind>,
    ) -> Vec<AnnotationId> {
        let (start, end) = self.normalize_range(start, end);
        let mut hits: Vec<(u8, AnnotationId)> = self
            .entries
            .iter()
            .filter(|e| e.ann.overlaps(start, end))
            .filter(|e| kind.is_none_or(|k| e.ann.kind == k))
            .map(|e| (e.ann.priority, e.id))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    // === Observers ===

    /// Register an observer; callbacks fire in registration order.
    pub fn register_observer(&mut self, observer: Box<dyn BufferObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    /// Unregister an observer. Returns `false` if the handle is unknown or
    /// names an observer currently being notified.
    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn ensure_not_notifying(&self) -> Result<(), EditError> {
        if self.notifying {
            return Err(EditError::ReentrantMutation);
        }
        Ok(())
    }

    // Swap, clamp, and snap a range so the annotation invariant holds.
    fn normalize_range(&self, start: usize, end: usize) -> (usize, usize) {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        (self.snap(start), self.snap(end))
    }

    // Run a callback over every observer with the observer list moved out,
    // so callbacks can read the buffer while the reentrancy guard is up.
    fn dispatch(&mut self, mut f: impl FnMut(&mut dyn BufferObserver, &mut AnnotatedBuffer)) {
        if self.observers.is_empty() {
            return;
        }
        self.notifying = true;
        let mut taken = std::mem::take(&mut self.observers);
        for (_, obs) in taken.iter_mut() {
            f(obs.as_mut(), self);
        }
        // Observers registered during the callbacks landed in self.observers.
        let added = std::mem::replace(&mut self.observers, taken);
        self.observers.extend(added);
        self.notifying = false;
    }
}

#[derive(Clone, Copy)]
enum Side {
    Start,
    End,
}

// The repositioning rule of the buffer contract, for a single endpoint.
fn reposition(
    offset: usize,
    side: Side,
    boundary: Boundary,
    start: usize,
    end: usize,
    new_len: usize,
) -> usize {
    if offset < start {
        offset
    } else if offset > end {
        offset - (end - start) + new_len
    } else {
        let at_edge = offset == start || offset == end;
        let past_insertion = at_edge
            && match side {
                Side::Start => boundary == Boundary::Exclusive,
                Side::End => boundary == Boundary::Inclusive,
            };
        if past_insertion {
            start + new_len
        } else {
            start
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn marker_with(
        buf: &mut AnnotatedBuffer,
        start: usize,
        end: usize,
        sb: Boundary,
        eb: Boundary,
    ) -> AnnotationId {
        buf.insert_annotation(Annotation::marker("m", start, end).with_boundaries(sb, eb))
            .unwrap()
    }

    fn range_of(buf: &AnnotatedBuffer, id: AnnotationId) -> (usize, usize) {
        let ann = buf.annotation(id).unwrap();
        (ann.start, ann.end)
    }

    #[test]
    fn test_replace_basic() {
        let mut buf = AnnotatedBuffer::from_text("hello world");
        buf.replace(6, 11, "there").unwrap();
        assert_eq!(buf.text(), "hello there");
        buf.replace(5, 5, ",").unwrap();
        assert_eq!(buf.text(), "hello, there");
    }

    #[test]
    fn test_replace_out_of_range() {
        let mut buf = AnnotatedBuffer::from_text("hello");
        assert_eq!(
            buf.replace(3, 2, "x"),
            Err(EditError::OutOfRange {
                start: 3,
                end: 2,
                len: 5
            })
        );
        assert_eq!(
            buf.replace(0, 6, "x"),
            Err(EditError::OutOfRange {
                start: 0,
                end: 6,
                len: 5
            })
        );
        assert_eq!(buf.text(), "hello");
    }

    #[test]
    fn test_code_unit_lengths() {
        // "😀" is one scalar value, two UTF-16 code units.
        let buf = AnnotatedBuffer::from_text("a😀b");
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.len_chars(), 3);
        assert_eq!(buf.char_at(1), Some('😀'));
        assert_eq!(buf.char_at(2), Some('😀'));
        assert_eq!(buf.char_at(3), Some('b'));
        assert_eq!(buf.char_at(4), None);
    }

    #[test]
    fn test_surrogate_interior_snaps() {
        let mut buf = AnnotatedBuffer::from_text("a😀b");
        // Offset 2 is inside the emoji's pair; it snaps back to 1.
        buf.replace(2, 2, "x").unwrap();
        assert_eq!(buf.text(), "ax😀b");
    }

    #[test]
    fn test_slice() {
        let buf = AnnotatedBuffer::from_text("hello world");
        assert_eq!(buf.slice(0, 5).as_deref(), Some("hello"));
        assert_eq!(buf.slice(6, 11).as_deref(), Some("world"));
        assert_eq!(buf.slice(6, 12), None);
        assert_eq!(buf.slice(7, 6), None);
    }

    #[test]
    fn test_annotation_shifts_with_edits() {
        let mut buf = AnnotatedBuffer::from_text("hello world");
        let id = marker_with(&mut buf, 6, 11, Boundary::Exclusive, Boundary::Exclusive);

        // Insert before: both endpoints shift.
        buf.replace(0, 0, ">> ").unwrap();
        assert_eq!(range_of(&buf, id), (9, 14));

        // Insert after: untouched.
        buf.replace(14, 14, "!").unwrap();
        assert_eq!(range_of(&buf, id), (9, 14));

        // Delete a prefix of the annotated range: start collapses.
        buf.replace(8, 11, "").unwrap();
        assert_eq!(range_of(&buf, id), (8, 11));
    }

    #[test]
    fn test_boundary_matrix_on_insert_at_edges() {
        // Insert at the start edge of a [2,4) annotation in "abcdef".
        for (sb, expected_start) in [(Boundary::Inclusive, 2), (Boundary::Exclusive, 4)] {
            let mut buf = AnnotatedBuffer::from_text("abcdef");
            let id = marker_with(&mut buf, 2, 4, sb, Boundary::Exclusive);
            buf.replace(2, 2, "xy").unwrap();
            assert_eq!(range_of(&buf, id), (expected_start, 6), "{sb:?}");
        }
        // Insert at the end edge.
        for (eb, expected_end) in [(Boundary::Inclusive, 6), (Boundary::Exclusive, 4)] {
            let mut buf = AnnotatedBuffer::from_text("abcdef");
            let id = marker_with(&mut buf, 2, 4, Boundary::Exclusive, eb);
            buf.replace(4, 4, "xy").unwrap();
            assert_eq!(range_of(&buf, id), (2, expected_end), "{eb:?}");
        }
    }

    #[test]
    fn test_endpoint_inside_deleted_range_collapses() {
        let mut buf = AnnotatedBuffer::from_text("abcdefgh");
        let id = marker_with(&mut buf, 3, 5, Boundary::Exclusive, Boundary::Exclusive);
        buf.replace(2, 6, "XY").unwrap();
        assert_eq!(buf.text(), "abXYgh");
        assert_eq!(range_of(&buf, id), (2, 2));
    }

    #[test]
    fn test_replace_exact_range_inclusive_end_covers_replacement() {
        let mut buf = AnnotatedBuffer::from_text("hello world");
        let id = marker_with(&mut buf, 6, 11, Boundary::Inclusive, Boundary::Inclusive);
        buf.replace(6, 11, "there!").unwrap();
        assert_eq!(range_of(&buf, id), (6, 12));
    }

    #[test]
    fn test_insert_annotation_clamps_and_swaps() {
        let mut buf = AnnotatedBuffer::from_text("hello");
        let id = buf.insert_annotation(Annotation::marker("m", 9, 3)).unwrap();
        assert_eq!(range_of(&buf, id), (3, 5));
    }

    #[test]
    fn test_move_and_remove_annotation() {
        let mut buf = AnnotatedBuffer::from_text("hello");
        let id = buf.insert_annotation(Annotation::marker("m", 0, 2)).unwrap();
        buf.move_annotation(id, 1, 4).unwrap();
        assert_eq!(range_of(&buf, id), (1, 4));

        let ann = buf.remove_annotation(id).unwrap();
        assert_eq!((ann.start, ann.end), (1, 4));
        assert_eq!(
            buf.remove_annotation(id),
            Err(EditError::UnknownAnnotation(id))
        );
        assert_eq!(
            buf.move_annotation(id, 0, 0),
            Err(EditError::UnknownAnnotation(id))
        );
    }

    #[test]
    fn test_query_order_by_priority_then_insertion() {
        let mut buf = AnnotatedBuffer::from_text("hello world");
        let low = buf
            .insert_annotation(Annotation::marker("low", 0, 5).with_priority(1))
            .unwrap();
        let high = buf
            .insert_annotation(Annotation::marker("high", 3, 8).with_priority(9))
            .unwrap();
        let low2 = buf
            .insert_annotation(Annotation::marker("low2", 4, 6).with_priority(1))
            .unwrap();

        assert_eq!(buf.query_annotations(0, 11, None), vec![high, low, low2]);
        assert_eq!(
            buf.query_annotations(0, 11, Some(AnnotationKind::Composing)),
            vec![]
        );
        // Out of range query clamps rather than failing.
        assert_eq!(buf.query_annotations(9, 99, None), vec![]);
    }

    struct PhaseRecorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl BufferObserver for PhaseRecorder {
        fn before_replace(&mut self, buf: &mut AnnotatedBuffer, start: usize, end: usize, _: usize) {
            self.log
                .borrow_mut()
                .push(format!("before {start}..{end} {:?}", buf.slice(start, end)));
        }
        fn after_replace(&mut self, buf: &mut AnnotatedBuffer, start: usize, _: usize, new_len: usize) {
            self.log
                .borrow_mut()
                .push(format!("after {:?}", buf.slice(start, start + new_len)));
        }
        fn annotation_moved(&mut self, _: &mut AnnotatedBuffer, _: AnnotationId, os: usize, oe: usize) {
            self.log.borrow_mut().push(format!("moved from {os}..{oe}"));
        }
    }

    #[test]
    fn test_three_phase_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut buf = AnnotatedBuffer::from_text("hello");
        buf.insert_annotation(Annotation::marker("m", 5, 5)).unwrap();
        buf.register_observer(Box::new(PhaseRecorder { log: log.clone() }));

        buf.replace(0, 5, "goodbye").unwrap();
        assert_eq!(
            log.borrow().as_slice(),
            [
                "before 0..5 Some(\"hello\")",
                "moved from 5..5",
                "after Some(\"goodbye\")",
            ]
        );
    }

    struct Reenterer {
        result: Rc<RefCell<Option<Result<(), EditError>>>>,
    }

    impl BufferObserver for Reenterer {
        fn after_replace(&mut self, buf: &mut AnnotatedBuffer, _: usize, _: usize, _: usize) {
            *self.result.borrow_mut() = Some(buf.replace(0, 0, "nope"));
        }
    }

    #[test]
    fn test_reentrant_mutation_rejected() {
        let result = Rc::new(RefCell::new(None));
        let mut buf = AnnotatedBuffer::from_text("hello");
        buf.register_observer(Box::new(Reenterer {
            result: result.clone(),
        }));

        buf.replace(5, 5, "!").unwrap();
        assert_eq!(*result.borrow(), Some(Err(EditError::ReentrantMutation)));
        assert_eq!(buf.text(), "hello!");
    }

    #[test]
    fn test_unregister_observer() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut buf = AnnotatedBuffer::from_text("x");
        let id = buf.register_observer(Box::new(PhaseRecorder { log: log.clone() }));
        assert!(buf.unregister_observer(id));
        assert!(!buf.unregister_observer(id));

        buf.replace(0, 1, "y").unwrap();
        assert!(log.borrow().is_empty());
    }
}
