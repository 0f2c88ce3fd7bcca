//! etch-editor-core: the editing core behind a text-input field.
//!
//! This crate provides:
//! - `AnnotatedBuffer` - ropey-backed character buffer with repositioning
//!   annotations, addressed in UTF-16 code units
//! - `SelectionTracker` / `FieldEditor` - selection and composing-region
//!   state built on the annotation mechanism
//! - `BufferObserver` - three-phase change notification with an enforced
//!   reentrancy guard
//! - `TextLayout` / `HitTester` - offset ⇄ coordinate translation over an
//!   opaque layout snapshot
//!
//! The remote input-method protocol lives in `etch-editor-ime`, built on
//! top of this crate.

pub mod annotation;
pub mod buffer;
pub mod editor;
pub mod error;
pub mod layout;
pub mod notify;
pub mod selection;

pub use annotation::{Annotation, AnnotationId, AnnotationKind, Boundary};
pub use buffer::{utf16_len, AnnotatedBuffer};
pub use editor::FieldEditor;
pub use error::EditError;
pub use layout::{HitTester, TextLayout, Viewport};
pub use notify::{BufferObserver, ObserverId};
pub use selection::SelectionTracker;
pub use smol_str::SmolStr;
