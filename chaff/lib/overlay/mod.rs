//! The overlay-resolution engine.
//!
//! Replays a container image's layers against union-filesystem semantics and classifies every
//! entry as live (visible in the merged filesystem) or chaff (shipped but unreachable).
//!
//! The replay runs from the newest layer to the oldest. A whiteout marker (`.wh.<name>`) in a
//! layer means the named path no longer exists in any layer below it, so scanning newest first
//! lets a single pass answer "has a newer layer already decided this path?" by looking it up in
//! [`OverlayState`]:
//!
//! - a path already finalized by a newer layer is chaff,
//! - a path beneath a tombstoned directory is chaff,
//! - a non-directory write tombstones its path for all older layers,
//! - whiteout markers only populate the state and are never chaff themselves.
//!
//! Opaque-directory markers (`.wh..wh..opq`) get no special treatment.

mod classify;
mod engine;
mod entry;
pub mod path;
mod report;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use classify::*;
pub use engine::*;
pub use entry::*;
pub use path::{NormalizedPath, WHITEOUT_OPAQUE, WHITEOUT_PREFIX};
pub use report::*;
pub use state::*;
