use super::{LayerEntry, NormalizedPath, OverlayState};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The outcome of classifying one layer entry against the overlay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The entry is visible in the merged filesystem.
    Live {
        /// Whether the entry blocks its path for every older layer.
        tombstoned: bool,
    },

    /// The entry is shipped but unreachable. Carries the wasted byte count.
    Chaff(u64),

    /// The entry is a whiteout marker. Markers are never chaff.
    Whiteout {
        /// Whether the marker tombstoned its path. False when a newer layer already decided it.
        applied: bool,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Classification {
    /// Returns true if the entry is chaff.
    pub fn is_chaff(&self) -> bool {
        matches!(self, Self::Chaff(_))
    }

    /// Returns the tombstone flag to record for the entry's path, if it should be recorded.
    pub fn finalizes(&self) -> Option<bool> {
        match self {
            Self::Live { tombstoned } => Some(*tombstoned),
            Self::Whiteout { applied: true } => Some(true),
            _ => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decides whether `entry` is live, chaff, or a whiteout marker, given everything newer layers
/// have already finalized.
///
/// This only reads `state`; the caller applies [`Classification::finalizes`] afterwards.
/// A non-directory write tombstones its path even without a whiteout, since it fully determines
/// what lives there.
pub fn classify(state: &OverlayState, path: &NormalizedPath, entry: &LayerEntry) -> Classification {
    let shadowed = state.is_shadowed(path.logical());

    if path.is_whiteout() {
        return Classification::Whiteout { applied: !shadowed };
    }

    if shadowed {
        return Classification::Chaff(entry.size());
    }

    Classification::Live {
        tombstoned: !path.is_directory(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
