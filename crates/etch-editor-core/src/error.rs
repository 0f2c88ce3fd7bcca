//! Error types for buffer mutations.

use thiserror::Error;

use crate::annotation::AnnotationId;

/// Errors surfaced by the annotated buffer.
///
/// All of these are caller-contract violations: they fail the specific call
/// without corrupting buffer state, and none of them tears down the session.
/// Out-of-range requests arriving from the remote input method are clamped
/// upstream and never reach these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
    /// Replace range is inverted or extends past the end of the buffer.
    #[error("range {start}..{end} out of bounds for buffer of length {len}")]
    OutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },

    /// A mutation was attempted from inside a change callback.
    #[error("buffer mutated from inside a change callback")]
    ReentrantMutation,

    /// The annotation handle does not name a live annotation.
    #[error("unknown annotation {0:?}")]
    UnknownAnnotation(AnnotationId),
}
