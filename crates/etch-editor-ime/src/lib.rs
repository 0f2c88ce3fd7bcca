//! etch-editor-ime: the remote input-method side of the editing core.
//!
//! Builds on `etch-editor-core` to give a host view one object per editable
//! field that speaks the input-method protocol:
//! - `ChangeWindow` - accumulator of pending edits between transaction
//!   open and close
//! - `BatchCoordinator` - per-connection transaction nesting with stale
//!   connection isolation
//! - `ExtractedText` / `extract` - detached buffer snapshots for the
//!   process boundary
//! - `ImeSession` - the protocol operations (commit, compose, delete
//!   surrounding, reads, extraction), generic over the `RemotePeer` and
//!   `HostView` collaborator traits

pub mod batch;
pub mod extract;
pub mod peer;
pub mod session;
pub mod window;

pub use batch::{BatchCoordinator, BeginResult, ConnectionId, EndResult};
pub use extract::{extract, ExtractRequest, ExtractedText};
pub use peer::{HostView, RemotePeer, UpdateMode};
pub use session::ImeSession;
pub use window::{ChangeWindow, PendingSpan, WindowSnapshot};
