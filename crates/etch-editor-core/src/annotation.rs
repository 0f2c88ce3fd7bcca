//! Annotations: tagged ranges over the buffer with repositioning rules.
//!
//! An annotation marks a span of buffer text with an opaque payload. The
//! buffer repositions every annotation on every edit; the boundary flags on
//! each end decide whether text inserted exactly at that end is absorbed
//! into the annotation or left outside it.

use smol_str::SmolStr;

/// Stable handle for an annotation living in a buffer.
///
/// Returned by [`AnnotatedBuffer::insert_annotation`] and used to move,
/// remove, or look up the annotation later. Handles are never reused within
/// a buffer's lifetime.
///
/// [`AnnotatedBuffer::insert_annotation`]: crate::buffer::AnnotatedBuffer::insert_annotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub(crate) u64);

/// Whether an annotation end absorbs text inserted exactly at its offset.
///
/// `Inclusive` means the end extends so the inserted text lands inside the
/// annotation; `Exclusive` means the inserted text stays outside. The two
/// ends carry independent flags, replacing the bit-packed span flags of
/// classic toolkit span models with an explicit pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Inclusive,
    Exclusive,
}

/// What role an annotation plays, used to filter change callbacks.
///
/// The selection anchors and the composing region are ordinary annotations
/// as far as repositioning goes; the kind is how the selection tracker and
/// the remote-sync bookkeeping recognize their own spans among everyone
/// else's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Zero-width anchor for the selection start.
    SelectionStart,
    /// Zero-width anchor for the selection end.
    SelectionEnd,
    /// The region currently being assembled by the input method.
    Composing,
    /// Host-defined formatting or bookkeeping span.
    Marker,
}

/// A tagged range over the buffer.
///
/// Offsets are UTF-16 code units and always satisfy
/// `0 <= start <= end <= buffer length`; the buffer maintains this by
/// repositioning annotations on every edit and clamping on insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    /// Opaque payload, uninterpreted by the buffer.
    pub payload: SmolStr,
    pub kind: AnnotationKind,
    pub start: usize,
    pub end: usize,
    pub start_boundary: Boundary,
    pub end_boundary: Boundary,
    /// Query ordering: higher priorities sort first.
    pub priority: u8,
    /// Transient waypoint in a multi-step update; observers may suppress
    /// reaction to changes of intermediate annotations.
    pub intermediate: bool,
    /// Must not be truncated when text is snapshotted across the process
    /// boundary; extraction widens its window over such annotations.
    pub no_truncate: bool,
}

impl Annotation {
    /// A host-defined marker span. Both ends exclusive: text typed at either
    /// edge stays outside the span.
    pub fn marker(payload: impl Into<SmolStr>, start: usize, end: usize) -> Self {
        Self {
            payload: payload.into(),
            kind: AnnotationKind::Marker,
            start,
            end,
            start_boundary: Boundary::Exclusive,
            end_boundary: Boundary::Exclusive,
            priority: 0,
            intermediate: false,
            no_truncate: false,
        }
    }

    pub(crate) fn selection_start(offset: usize) -> Self {
        Self::anchor(AnnotationKind::SelectionStart, offset)
    }

    pub(crate) fn selection_end(offset: usize) -> Self {
        Self::anchor(AnnotationKind::SelectionEnd, offset)
    }

    pub(crate) fn composing(start: usize, end: usize) -> Self {
        Self {
            payload: SmolStr::default(),
            kind: AnnotationKind::Composing,
            start,
            end,
            start_boundary: Boundary::Exclusive,
            end_boundary: Boundary::Exclusive,
            priority: 0,
            intermediate: false,
            no_truncate: false,
        }
    }

    // Zero-width anchor that rides along after text inserted at its offset,
    // so typing at a collapsed cursor carries the cursor with it.
    fn anchor(kind: AnnotationKind, offset: usize) -> Self {
        Self {
            payload: SmolStr::default(),
            kind,
            start: offset,
            end: offset,
            start_boundary: Boundary::Exclusive,
            end_boundary: Boundary::Inclusive,
            priority: 0,
            intermediate: false,
            no_truncate: false,
        }
    }

    /// Set the boundary flags for both ends.
    pub fn with_boundaries(mut self, start: Boundary, end: Boundary) -> Self {
        self.start_boundary = start;
        self.end_boundary = end;
        self
    }

    /// Set the query-ordering priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as a transient waypoint in a multi-step update.
    pub fn intermediate(mut self) -> Self {
        self.intermediate = true;
        self
    }

    /// Forbid truncating this annotation across a process boundary.
    pub fn no_truncate(mut self) -> Self {
        self.no_truncate = true;
        self
    }

    /// Annotation length in code units.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-width annotations.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if the annotation touches the given range (shared edges count).
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start <= end && self.end >= start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_defaults() {
        let ann = Annotation::marker("bold", 2, 5);
        assert_eq!(ann.kind, AnnotationKind::Marker);
        assert_eq!(ann.len(), 3);
        assert_eq!(ann.start_boundary, Boundary::Exclusive);
        assert_eq!(ann.end_boundary, Boundary::Exclusive);
        assert!(!ann.intermediate);
        assert!(!ann.no_truncate);
    }

    #[test]
    fn test_builder_flags() {
        let ann = Annotation::marker("x", 0, 1)
            .with_boundaries(Boundary::Inclusive, Boundary::Inclusive)
            .with_priority(7)
            .intermediate()
            .no_truncate();
        assert_eq!(ann.start_boundary, Boundary::Inclusive);
        assert_eq!(ann.end_boundary, Boundary::Inclusive);
        assert_eq!(ann.priority, 7);
        assert!(ann.intermediate);
        assert!(ann.no_truncate);
    }

    #[test]
    fn test_overlaps() {
        let ann = Annotation::marker("x", 3, 6);
        assert!(ann.overlaps(0, 3)); // shared edge counts
        assert!(ann.overlaps(6, 9));
        assert!(ann.overlaps(4, 5));
        assert!(!ann.overlaps(7, 9));
        assert!(!ann.overlaps(0, 2));
    }

    #[test]
    fn test_anchor_is_zero_width() {
        let ann = Annotation::selection_start(4);
        assert!(ann.is_empty());
        assert_eq!(ann.start_boundary, Boundary::Exclusive);
        assert_eq!(ann.end_boundary, Boundary::Inclusive);
    }
}
