//! Extracted-text snapshots shipped across the process boundary.
//!
//! The remote peer never sees the live buffer; it sees `ExtractedText`
//! snapshots built here, either the whole buffer or a minimal diff derived
//! from the change window. Offsets on the wire are i32 with -1 as the
//! "not applicable" sentinel.

use etch_editor_core::FieldEditor;
use smol_str::SmolStr;

use crate::window::PendingSpan;

/// Parameters of an extraction, as sent by the remote peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Opaque token echoed back with every snapshot for this request.
    pub token: u32,
    /// Advisory size hint from the peer. Snapshots are not trimmed to it;
    /// the field is carried for wire compatibility.
    pub hint_max_chars: usize,
    /// Keep pushing snapshots at every transaction close.
    pub monitor: bool,
}

/// A detached snapshot of (part of) the buffer.
///
/// `partial_start`/`partial_end` bound `text` within the current buffer, or
/// are both -1 when `text` is the whole buffer. Selection offsets are always
/// absolute, regardless of whether the snapshot is partial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: SmolStr,
    pub partial_start: i32,
    pub partial_end: i32,
    pub selection_start: i32,
    pub selection_end: i32,
    pub selecting: bool,
}

/// Build a snapshot over the given pending span.
///
/// An `Unknown` span means no minimal diff is available and the whole buffer
/// ships with `partial_* = -1`. A known span is first shifted at its end by
/// `delta` (the span is in window-open coordinates, the text is current),
/// then widened over any overlapping annotation marked `no_truncate`, then
/// clamped into the buffer.
pub fn extract(editor: &FieldEditor, span: PendingSpan, delta: i64) -> ExtractedText {
    let len = editor.len();
    let (sel_start, sel_end) = editor.selection();

    let (text, partial_start, partial_end) = match span {
        PendingSpan::Unknown => (SmolStr::new(editor.text()), -1, -1),
        PendingSpan::Range { start, end } => {
            let mut start = start.min(len);
            let mut end = ((end as i64 + delta).clamp(0, len as i64) as usize).max(start);
            loop {
                let mut widened = false;
                for (_, ann) in editor.buffer().annotations() {
                    if ann.no_truncate && ann.overlaps(start, end) {
                        if ann.start < start {
                            start = ann.start;
                            widened = true;
                        }
                        if ann.end > end {
                            end = ann.end;
                            widened = true;
                        }
                    }
                }
                if !widened {
                    break;
                }
            }
            let start = editor.buffer().snap(start);
            let end = editor.buffer().snap(end);
            let text = editor.slice(start, end).unwrap_or_default();
            (text, start as i32, end as i32)
        }
    };

    ExtractedText {
        text,
        partial_start,
        partial_end,
        selection_start: sel_start as i32,
        selection_end: sel_end as i32,
        selecting: sel_start != sel_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etch_editor_core::Annotation;

    fn make_editor(text: &str) -> FieldEditor {
        FieldEditor::from_text(text)
    }

    #[test]
    fn test_unknown_span_ships_whole_buffer() {
        let mut editor = make_editor("hello world");
        editor.set_selection(2, 7).unwrap();

        let out = extract(&editor, PendingSpan::Unknown, 0);
        assert_eq!(out.text, "hello world");
        assert_eq!((out.partial_start, out.partial_end), (-1, -1));
        assert_eq!((out.selection_start, out.selection_end), (2, 7));
        assert!(out.selecting);
    }

    #[test]
    fn test_range_span_ships_diff() {
        let mut editor = make_editor("hello");
        editor.replace(5, 5, "!").unwrap();

        // The window recorded [5,5) before the insert; delta carries the
        // inserted length.
        let out = extract(&editor, PendingSpan::Range { start: 5, end: 5 }, 1);
        assert_eq!(out.text, "!");
        assert_eq!((out.partial_start, out.partial_end), (5, 6));
        assert!(!out.selecting);
    }

    #[test]
    fn test_span_clamped_into_buffer() {
        let editor = make_editor("hi");
        let out = extract(&editor, PendingSpan::Range { start: 1, end: 40 }, -3);
        assert!(out.partial_start >= 0);
        assert!(out.partial_start <= out.partial_end);
        assert!(out.partial_end as usize <= editor.len());
    }

    #[test]
    fn test_text_matches_partial_bounds() {
        let mut editor = make_editor("hello world");
        editor
            .insert_annotation(Annotation::marker("m", 3, 8))
            .unwrap();

        for (a, b, delta) in [(0, 5, 0), (6, 11, 0), (2, 2, 4), (0, 11, -2)] {
            let out = extract(&editor, PendingSpan::Range { start: a, end: b }, delta);
            let (ps, pe) = (out.partial_start as usize, out.partial_end as usize);
            assert!(ps <= pe && pe <= editor.len());
            assert_eq!(Some(out.text), editor.slice(ps, pe));
        }
    }

    #[test]
    fn test_no_truncate_widens_window() {
        let mut editor = make_editor("hello world");
        editor
            .insert_annotation(Annotation::marker("keep", 2, 9).no_truncate())
            .unwrap();

        let out = extract(&editor, PendingSpan::Range { start: 4, end: 6 }, 0);
        assert_eq!((out.partial_start, out.partial_end), (2, 9));
        assert_eq!(out.text, "llo wor");
    }

    #[test]
    fn test_no_truncate_widening_is_transitive() {
        let mut editor = make_editor("abcdefghij");
        editor
            .insert_annotation(Annotation::marker("a", 3, 5).no_truncate())
            .unwrap();
        // Overlaps the first marker, not the original span.
        editor
            .insert_annotation(Annotation::marker("b", 1, 3).no_truncate())
            .unwrap();

        let out = extract(&editor, PendingSpan::Range { start: 4, end: 6 }, 0);
        assert_eq!((out.partial_start, out.partial_end), (1, 6));
    }
}
