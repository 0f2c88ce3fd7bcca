//! The change window: a per-connection accumulator of pending edits.
//!
//! One window exists per remote connection. It opens when the outermost
//! batch edit begins, accumulates the minimal dirty span across every
//! nested mutation, and is consumed when the transaction closes and a diff
//! ships to the remote peer.

/// The dirty span, in coordinates of the text as it was when the window
/// opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingSpan {
    /// No span recorded; an extraction must report the whole buffer.
    Unknown,
    /// Minimal changed range of the pre-transaction text.
    Range { start: usize, end: usize },
}

/// Accumulated state of one transaction, taken at finalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub span: PendingSpan,
    /// Net length change (insertions minus deletions) since the window
    /// opened, in code units.
    pub delta: i64,
    pub content_changed: bool,
    pub selection_mode_changed: bool,
    pub cursor_changed: bool,
}

/// Accumulates buffer changes between transaction open and close.
#[derive(Clone, Copy, Debug)]
pub struct ChangeWindow {
    span: PendingSpan,
    delta: i64,
    content_changed: bool,
    selection_mode_changed: bool,
    cursor_changed: bool,
}

impl Default for ChangeWindow {
    fn default() -> Self {
        Self {
            span: PendingSpan::Unknown,
            delta: 0,
            content_changed: false,
            selection_mode_changed: false,
            cursor_changed: false,
        }
    }
}

impl ChangeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the window at the start of an outermost transaction.
    ///
    /// If a change was already pending from outside the transaction, the
    /// span widens to the whole buffer rather than losing information;
    /// otherwise the window starts empty.
    pub fn open(&mut self, buffer_len: usize) {
        if self.content_changed {
            self.span = PendingSpan::Range {
                start: 0,
                end: buffer_len,
            };
        } else {
            self.span = PendingSpan::Unknown;
        }
        self.delta = 0;
        self.cursor_changed = false;
    }

    /// Record a text replacement: `before` code units at `start` became
    /// `after` code units. Coordinates are of the buffer at the time of the
    /// edit; the span is kept in window-open coordinates by backing out the
    /// accumulated delta.
    pub fn note_text_changed(&mut self, start: usize, before: usize, after: usize) {
        self.content_changed = true;
        match self.span {
            PendingSpan::Unknown => {
                self.span = PendingSpan::Range {
                    start,
                    end: start + before,
                };
            }
            PendingSpan::Range {
                start: span_start,
                end: span_end,
            } => {
                let adjusted_end = ((start + before) as i64 - self.delta).max(0) as usize;
                self.span = PendingSpan::Range {
                    start: span_start.min(start),
                    end: span_end.max(adjusted_end),
                };
            }
        }
        self.delta += after as i64 - before as i64;
    }

    pub fn note_selection_changed(&mut self) {
        self.selection_mode_changed = true;
        self.cursor_changed = true;
    }

    pub fn note_cursor_changed(&mut self) {
        self.cursor_changed = true;
    }

    /// Mark content changed without a known span (annotation-only change);
    /// the next extraction reports the whole buffer.
    pub fn note_content_changed(&mut self) {
        self.content_changed = true;
    }

    pub fn content_changed(&self) -> bool {
        self.content_changed
    }

    /// Consume the window at transaction close, resetting it to "no pending
    /// change".
    pub fn take_snapshot(&mut self) -> WindowSnapshot {
        let snapshot = WindowSnapshot {
            span: self.span,
            delta: self.delta,
            content_changed: self.content_changed,
            selection_mode_changed: self.selection_mode_changed,
            cursor_changed: self.cursor_changed,
        };
        *self = Self::default();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_resets_clean_window() {
        let mut w = ChangeWindow::new();
        w.note_cursor_changed();
        w.open(10);
        let s = w.take_snapshot();
        assert_eq!(s.span, PendingSpan::Unknown);
        assert!(!s.cursor_changed);
        assert!(!s.content_changed);
        assert_eq!(s.delta, 0);
    }

    #[test]
    fn test_open_widens_over_pending_change() {
        let mut w = ChangeWindow::new();
        w.note_text_changed(3, 1, 2); // edit outside any transaction
        w.open(10);
        let s = w.take_snapshot();
        assert_eq!(s.span, PendingSpan::Range { start: 0, end: 10 });
        assert!(s.content_changed);
        assert_eq!(s.delta, 0);
    }

    #[test]
    fn test_accumulates_minimal_span() {
        let mut w = ChangeWindow::new();
        w.open(20);
        w.note_text_changed(5, 2, 6); // [5,7) -> 6 units, delta +4
        w.note_text_changed(3, 1, 1); // widens start to 3
        let s = w.take_snapshot();
        assert_eq!(s.span, PendingSpan::Range { start: 3, end: 7 });
        assert_eq!(s.delta, 4);
    }

    #[test]
    fn test_span_end_backs_out_delta() {
        let mut w = ChangeWindow::new();
        w.open(20);
        w.note_text_changed(0, 0, 4); // insert 4 at 0, delta +4
        w.note_text_changed(10, 2, 2); // post-insert coords; pre-insert end is 8
        let s = w.take_snapshot();
        assert_eq!(s.span, PendingSpan::Range { start: 0, end: 8 });
        assert_eq!(s.delta, 4);
    }

    #[test]
    fn test_selection_and_cursor_flags() {
        let mut w = ChangeWindow::new();
        w.open(5);
        w.note_selection_changed();
        let s = w.take_snapshot();
        assert!(s.selection_mode_changed);
        assert!(s.cursor_changed);
        assert!(!s.content_changed);

        let mut w = ChangeWindow::new();
        w.open(5);
        w.note_cursor_changed();
        let s = w.take_snapshot();
        assert!(s.cursor_changed);
        assert!(!s.selection_mode_changed);
    }

    #[test]
    fn test_take_snapshot_resets() {
        let mut w = ChangeWindow::new();
        w.open(5);
        w.note_text_changed(0, 0, 3);
        let _ = w.take_snapshot();
        let s = w.take_snapshot();
        assert_eq!(s.span, PendingSpan::Unknown);
        assert!(!s.content_changed);
        assert_eq!(s.delta, 0);
    }
}
