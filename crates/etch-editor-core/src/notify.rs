//! Change notification: ordered observers with a three-phase contract.
//!
//! Every buffer mutation notifies registered observers in registration
//! order, in three phases: `before_replace` with the old range, the
//! annotation add/remove/move callbacks interleaved with the update itself,
//! then `after_replace` with the new content in place.
//!
//! Observers receive the buffer mutably so they can inspect it with the
//! full read API, but any mutation attempted from inside a callback fails
//! with [`EditError::ReentrantMutation`]; the buffer enforces the guard
//! itself rather than trusting callback discipline.
//!
//! Observers registered from inside a callback take effect for subsequent
//! mutations; unregistering an observer while it is being notified is not
//! supported and returns `false`.
//!
//! [`EditError::ReentrantMutation`]: crate::error::EditError::ReentrantMutation

use crate::annotation::{Annotation, AnnotationId};
use crate::buffer::AnnotatedBuffer;

/// Handle for a registered observer, used to unregister it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Callbacks fired around every buffer mutation.
///
/// All methods default to no-ops; implement only the phases you need.
/// Offsets and lengths are UTF-16 code units.
pub trait BufferObserver {
    /// Fired before the text changes. `start..end` is the range about to be
    /// replaced by `new_len` code units; the buffer still holds the old text.
    fn before_replace(
        &mut self,
        buf: &mut AnnotatedBuffer,
        start: usize,
        end: usize,
        new_len: usize,
    ) {
        let _ = (buf, start, end, new_len);
    }

    /// Fired after the text changed. `old_len` code units at `start` were
    /// replaced by `new_len`; the buffer holds the new text.
    fn after_replace(
        &mut self,
        buf: &mut AnnotatedBuffer,
        start: usize,
        old_len: usize,
        new_len: usize,
    ) {
        let _ = (buf, start, old_len, new_len);
    }

    /// An annotation was inserted. Look it up through `buf` for details.
    fn annotation_added(&mut self, buf: &mut AnnotatedBuffer, id: AnnotationId) {
        let _ = (buf, id);
    }

    /// An annotation was removed. The annotation is no longer in the buffer,
    /// so its final state is passed by reference.
    fn annotation_removed(&mut self, buf: &mut AnnotatedBuffer, ann: &Annotation) {
        let _ = (buf, ann);
    }

    /// An annotation's range changed, either through an explicit move or
    /// because an edit repositioned it. The new range is on the annotation
    /// itself; `old_start..old_end` is where it used to be.
    fn annotation_moved(
        &mut self,
        buf: &mut AnnotatedBuffer,
        id: AnnotationId,
        old_start: usize,
        old_end: usize,
    ) {
        let _ = (buf, id, old_start, old_end);
    }
}
