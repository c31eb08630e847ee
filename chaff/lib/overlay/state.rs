use std::collections::{hash_map::Entry, HashMap};

use super::path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The set of logical paths already finalized by newer layers during a backward replay.
///
/// Each path maps to a tombstone flag. A tombstoned path blocks everything an older layer wrote
/// at or beneath it; an untombstoned path (a plain directory) only blocks identical entries.
///
/// Keys are only ever inserted, never updated or removed. The first insertion for a path wins.
#[derive(Debug, Default, Clone)]
pub struct OverlayState {
    paths: HashMap<String, bool>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OverlayState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tombstone flag for `path`, or `None` if no newer layer has finalized it.
    pub fn get(&self, path: &str) -> Option<bool> {
        self.paths.get(path).copied()
    }

    /// Returns true if a newer layer has already finalized `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Records `path` with its tombstone flag unless it is already present.
    ///
    /// Returns true if the path was inserted.
    pub fn finalize(&mut self, path: String, tombstoned: bool) -> bool {
        match self.paths.entry(path) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(tombstoned);
                true
            }
        }
    }

    /// Returns true if some ancestor directory of `path` is tombstoned.
    ///
    /// Walks lexical parents until the path is empty or is its own parent (`.` or `/`).
    pub fn in_whiteout_dir(&self, path: &str) -> bool {
        let mut current = path.to_string();
        loop {
            if current.is_empty() {
                return false;
            }

            let parent = path::dir(&current);
            if parent == current {
                return false;
            }

            if self.get(&parent) == Some(true) {
                return true;
            }

            current = parent;
        }
    }

    /// Returns true if `path` was already finalized or lies beneath a tombstoned directory.
    pub fn is_shadowed(&self, path: &str) -> bool {
        self.contains(path) || self.in_whiteout_dir(path)
    }

    /// Returns the number of finalized paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if no path has been finalized.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
