//! The remote input-method protocol session.
//!
//! One `ImeSession` per editable field. It owns the field editor, keeps a
//! change window current through a buffer observer, runs every protocol
//! operation inside a batch edit on the calling connection, and at the
//! close of each outermost transaction ships one consolidated update to the
//! host view and the remote peer.
//!
//! Every operation takes the caller's `ConnectionId` and returns `false`
//! (or `None` for reads) instead of failing when that connection has been
//! closed, so a stale input method can never disturb the field.

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;
use tracing::debug;

use etch_editor_core::buffer::utf16_len;
use etch_editor_core::{Annotation, AnnotatedBuffer, AnnotationId, AnnotationKind, BufferObserver, FieldEditor};

use crate::batch::{BatchCoordinator, BeginResult, ConnectionId, EndResult};
use crate::extract::{extract, ExtractRequest, ExtractedText};
use crate::peer::{HostView, RemotePeer, UpdateMode};
use crate::window::{ChangeWindow, PendingSpan};

/// Last selection state shipped to the peer, for deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SelectionReport {
    sel_start: i32,
    sel_end: i32,
    comp_start: i32,
    comp_end: i32,
}

// Feeds buffer change callbacks into the change window. Registered once at
// session construction and never removed.
struct WindowObserver {
    window: Rc<RefCell<ChangeWindow>>,
}

impl WindowObserver {
    fn classify(&self, ann: &Annotation) {
        if ann.intermediate {
            return;
        }
        let mut window = self.window.borrow_mut();
        match ann.kind {
            AnnotationKind::SelectionStart | AnnotationKind::SelectionEnd => {
                window.note_selection_changed();
            }
            AnnotationKind::Composing => window.note_cursor_changed(),
            AnnotationKind::Marker => window.note_content_changed(),
        }
    }
}

impl BufferObserver for WindowObserver {
    fn after_replace(&mut self, _: &mut AnnotatedBuffer, start: usize, old_len: usize, new_len: usize) {
        self.window
            .borrow_mut()
            .note_text_changed(start, old_len, new_len);
    }

    fn annotation_added(&mut self, buf: &mut AnnotatedBuffer, id: AnnotationId) {
        if let Some(ann) = buf.annotation(id) {
            self.classify(ann);
        }
    }

    fn annotation_removed(&mut self, _: &mut AnnotatedBuffer, ann: &Annotation) {
        self.classify(ann);
    }

    fn annotation_moved(&mut self, buf: &mut AnnotatedBuffer, id: AnnotationId, _: usize, _: usize) {
        if let Some(ann) = buf.annotation(id) {
            self.classify(ann);
        }
    }
}

/// Protocol session binding one field editor to a remote input method and
/// its host view.
pub struct ImeSession<P: RemotePeer, H: HostView> {
    editor: FieldEditor,
    window: Rc<RefCell<ChangeWindow>>,
    batches: BatchCoordinator,
    peer: P,
    host: H,
    monitor: Option<ExtractRequest>,
    push_mode: UpdateMode,
    last_reported: Option<SelectionReport>,
}

impl<P: RemotePeer, H: HostView> ImeSession<P, H> {
    /// Session over an empty field.
    pub fn new(peer: P, host: H) -> Self {
        Self::from_text("", peer, host)
    }

    /// Session over a field holding `text`, cursor at 0.
    pub fn from_text(text: &str, peer: P, host: H) -> Self {
        let mut editor = FieldEditor::from_text(text);
        let window = Rc::new(RefCell::new(ChangeWindow::new()));
        editor.register_observer(Box::new(WindowObserver {
            window: window.clone(),
        }));
        Self {
            editor,
            window,
            batches: BatchCoordinator::new(),
            peer,
            host,
            monitor: None,
            push_mode: UpdateMode::Off,
            last_reported: None,
        }
    }

    /// Read access to the field editor.
    pub fn editor(&self) -> &FieldEditor {
        &self.editor
    }

    /// Mutable access for host-side edits outside the protocol. Changes made
    /// here are picked up by the next transaction close.
    pub fn editor_mut(&mut self) -> &mut FieldEditor {
        &mut self.editor
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    // === Connection lifecycle ===

    /// Register a new connection, force-closing any previous live one, and
    /// reset per-connection state so the new input method starts clean.
    pub fn open_connection(&mut self) -> ConnectionId {
        if let Some(prev) = self.batches.live() {
            if self.batches.force_close(prev) {
                self.finalize();
            }
        }
        self.monitor = None;
        self.push_mode = UpdateMode::Off;
        self.last_reported = None;
        self.batches.open()
    }

    /// Permanently close a connection, finalizing its open transaction if
    /// any. Closing an unknown or already-closed connection is a no-op.
    pub fn close_connection(&mut self, id: ConnectionId) {
        let was_live = self.batches.live() == Some(id);
        if self.batches.force_close(id) {
            self.finalize();
        }
        if was_live {
            self.monitor = None;
            self.push_mode = UpdateMode::Off;
        }
    }

    // === Batch edits ===

    /// Enter a (possibly nested) transaction on `id`.
    pub fn begin_batch_edit(&mut self, id: ConnectionId) -> bool {
        match self.batches.begin(id) {
            BeginResult::Rejected => false,
            BeginResult::Entered => {
                self.window.borrow_mut().open(self.editor.len());
                true
            }
            BeginResult::Nested => true,
        }
    }

    /// Leave a transaction on `id`; the outermost exit finalizes.
    pub fn end_batch_edit(&mut self, id: ConnectionId) -> bool {
        match self.batches.end(id) {
            EndResult::Rejected => false,
            EndResult::Exited => {
                self.finalize();
                true
            }
            EndResult::Nested => true,
        }
    }

    fn run_edit(&mut self, id: ConnectionId, f: impl FnOnce(&mut Self) -> bool) -> bool {
        if !self.begin_batch_edit(id) {
            return false;
        }
        let ok = f(self);
        self.end_batch_edit(id);
        ok
    }

    // === Protocol operations ===

    /// Replace the composing region (or the selection if none) with `text`
    /// and leave no composing region. `new_cursor` is relative: `n > 0`
    /// counts from the end of the inserted text (1 = right after), `n <= 0`
    /// from its start (0 and -1 = right before).
    pub fn commit_text(&mut self, id: ConnectionId, text: &str, new_cursor: i32) -> bool {
        self.run_edit(id, |s| s.apply_commit(text, new_cursor, false))
    }

    /// Like [`commit_text`](Self::commit_text), but the inserted text
    /// becomes the new composing region.
    pub fn set_composing_text(&mut self, id: ConnectionId, text: &str, new_cursor: i32) -> bool {
        self.run_edit(id, |s| s.apply_commit(text, new_cursor, true))
    }

    /// Mark an existing stretch of text as the composing region. Reversed
    /// bounds are swapped and out-of-range bounds clamped, never rejected.
    pub fn set_composing_region(&mut self, id: ConnectionId, start: i32, end: i32) -> bool {
        self.run_edit(id, |s| {
            s.editor
                .set_composing_region(start.max(0) as usize, end.max(0) as usize)
                .is_ok()
        })
    }

    /// Drop the composing region, leaving the text as committed.
    pub fn finish_composing(&mut self, id: ConnectionId) -> bool {
        self.run_edit(id, |s| s.editor.clear_composing_region().is_ok())
    }

    /// Delete `before` code units before and `after` code units after the
    /// selection. The deletion pivots widen over the composing region, so
    /// in-progress composition is never split.
    pub fn delete_surrounding(&mut self, id: ConnectionId, before: usize, after: usize) -> bool {
        self.run_edit(id, |s| {
            let (a, b) = s.deletion_pivots();
            let after_end = (b + after).min(s.editor.len());
            let before_start = a.saturating_sub(before);
            s.delete_ranges(before_start, a, b, after_end)
        })
    }

    /// Like [`delete_surrounding`](Self::delete_surrounding), but counting
    /// whole code points, so an astral-plane character is never halved.
    pub fn delete_surrounding_in_chars(
        &mut self,
        id: ConnectionId,
        before: usize,
        after: usize,
    ) -> bool {
        self.run_edit(id, |s| {
            let (a, b) = s.deletion_pivots();
            let buf = s.editor.buffer();
            let a_char = buf.code_unit_to_char(a);
            let b_char = buf.code_unit_to_char(b);
            let before_start = buf.char_to_code_unit(a_char.saturating_sub(before));
            let after_end = buf.char_to_code_unit((b_char + after).min(buf.len_chars()));
            s.delete_ranges(before_start, a, b, after_end)
        })
    }

    /// Move the selection. Out-of-range offsets are clamped, never rejected.
    pub fn set_selection(&mut self, id: ConnectionId, start: i32, end: i32) -> bool {
        self.run_edit(id, |s| {
            s.editor
                .set_selection(start.max(0) as usize, end.max(0) as usize)
                .is_ok()
        })
    }

    /// Up to `n` code units before the selection. `None` on a closed
    /// connection; short reads near the buffer start are clamped.
    pub fn read_before(&self, id: ConnectionId, n: usize) -> Option<SmolStr> {
        if !self.batches.is_open(id) {
            return None;
        }
        let (start, end) = self.editor.selection();
        let at = start.min(end);
        self.editor.slice(at.saturating_sub(n), at)
    }

    /// Up to `n` code units after the selection.
    pub fn read_after(&self, id: ConnectionId, n: usize) -> Option<SmolStr> {
        if !self.batches.is_open(id) {
            return None;
        }
        let (start, end) = self.editor.selection();
        let at = start.max(end);
        self.editor.slice(at, (at + n).min(self.editor.len()))
    }

    /// The selected text, or `None` if the selection is collapsed or the
    /// connection is closed.
    pub fn read_selected(&self, id: ConnectionId) -> Option<SmolStr> {
        if !self.batches.is_open(id) || !self.editor.has_selection() {
            return None;
        }
        let (start, end) = self.editor.selection();
        self.editor.slice(start.min(end), start.max(end))
    }

    /// Turn continuous extracted-text pushes on or off. Pushes also need a
    /// monitoring request registered via
    /// [`extract_text`](Self::extract_text).
    pub fn request_updates(&mut self, id: ConnectionId, mode: UpdateMode) -> bool {
        if !self.batches.is_open(id) {
            return false;
        }
        self.push_mode = mode;
        true
    }

    /// One-shot snapshot of the whole buffer. A `monitor` request is also
    /// registered for diff pushes at every transaction close.
    pub fn extract_text(&mut self, id: ConnectionId, req: ExtractRequest) -> Option<ExtractedText> {
        if !self.batches.is_open(id) {
            return None;
        }
        if req.monitor {
            self.monitor = Some(req);
            self.push_mode = UpdateMode::Monitor;
        }
        Some(extract(&self.editor, PendingSpan::Unknown, 0))
    }

    // === Internals ===

    fn apply_commit(&mut self, text: &str, new_cursor: i32, composing: bool) -> bool {
        let (start, end) = self.replace_target();
        if self.editor.clear_composing_region().is_err() {
            return false;
        }
        if self.editor.replace(start, end, text).is_err() {
            return false;
        }
        let inserted = utf16_len(text);
        if composing
            && inserted > 0
            && self
                .editor
                .set_composing_region(start, start + inserted)
                .is_err()
        {
            return false;
        }
        let cursor = resolve_new_cursor(new_cursor, start, start + inserted, self.editor.len());
        self.editor.set_selection(cursor, cursor).is_ok()
    }

    // The range a commit replaces: the composing region when one exists,
    // otherwise the selection.
    fn replace_target(&self) -> (usize, usize) {
        if let Some(region) = self.editor.composing_region() {
            return region;
        }
        let (start, end) = self.editor.selection();
        (start.min(end), start.max(end))
    }

    // Selection bounds widened over the composing region.
    fn deletion_pivots(&self) -> (usize, usize) {
        let (start, end) = self.editor.selection();
        let (mut a, mut b) = (start.min(end), start.max(end));
        if let Some((cs, ce)) = self.editor.composing_region() {
            a = a.min(cs);
            b = b.max(ce);
        }
        (a, b)
    }

    // Delete the trailing range first so the leading range's offsets stay
    // valid.
    fn delete_ranges(&mut self, before_start: usize, a: usize, b: usize, after_end: usize) -> bool {
        if after_end > b && self.editor.replace(b, after_end, "").is_err() {
            return false;
        }
        if a > before_start && self.editor.replace(before_start, a, "").is_err() {
            return false;
        }
        true
    }

    // Transaction close: one consolidated update for everything that
    // accumulated in the window.
    fn finalize(&mut self) {
        let snapshot = self.window.borrow_mut().take_snapshot();
        debug!(
            target: "etch::ime",
            content = snapshot.content_changed,
            selection = snapshot.selection_mode_changed,
            cursor = snapshot.cursor_changed,
            "finalize transaction"
        );
        if snapshot.content_changed || snapshot.selection_mode_changed {
            self.host.content_invalidated();
            if self.push_mode == UpdateMode::Monitor {
                if let Some(req) = self.monitor {
                    let text = extract(&self.editor, snapshot.span, snapshot.delta);
                    self.peer.updated_extracted_text(req.token, &text);
                }
            }
        } else if snapshot.cursor_changed {
            self.host.cursor_invalidated();
        }
        self.report_selection();
    }

    fn report_selection(&mut self) {
        let (sel_start, sel_end) = self.editor.selection();
        let composing = self.editor.composing_region();
        let report = SelectionReport {
            sel_start: sel_start as i32,
            sel_end: sel_end as i32,
            comp_start: composing.map_or(-1, |(s, _)| s as i32),
            comp_end: composing.map_or(-1, |(_, e)| e as i32),
        };
        if self.last_reported != Some(report) {
            self.peer.updated_selection(
                report.sel_start,
                report.sel_end,
                report.comp_start,
                report.comp_end,
            );
            self.last_reported = Some(report);
        }
    }
}

// `new_cursor` resolution: positive counts from the end of the inserted
// text with 1 meaning directly after it, zero and negative count from its
// start with both 0 and -1 meaning directly before it.
fn resolve_new_cursor(n: i32, start: usize, end: usize, len: usize) -> usize {
    let pos = if n > 0 {
        end as i64 + (i64::from(n) - 1)
    } else {
        start as i64 + (i64::from(n) + 1).min(0)
    };
    pos.clamp(0, len as i64) as usize
}
