//! Collaborator traits at the two edges of the protocol session.
//!
//! `RemotePeer` is the outbound half of the wire, implemented by the
//! transport to the input method. `HostView` is the embedding view, told
//! when to repaint. Both are plain trait objects with no required state, so
//! tests drive the session with recording fakes.

use crate::extract::ExtractedText;

/// Outbound notifications to the remote input method.
pub trait RemotePeer {
    /// The selection or composing region changed. Composing offsets are -1
    /// when no composing region exists.
    fn updated_selection(&mut self, sel_start: i32, sel_end: i32, comp_start: i32, comp_end: i32);

    /// A new snapshot for a monitoring extract request.
    fn updated_extracted_text(&mut self, token: u32, text: &ExtractedText);
}

/// Invalidation hooks into the embedding view.
pub trait HostView {
    /// Text or visible annotations changed; repaint the content.
    fn content_invalidated(&mut self);

    /// Only the cursor or composing highlight moved.
    fn cursor_invalidated(&mut self);
}

/// Whether finalization pushes extracted-text snapshots to the peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    #[default]
    Off,
    Monitor,
}
