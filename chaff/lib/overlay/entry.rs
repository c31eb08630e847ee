use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single entry read from a layer archive, in archive order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct LayerEntry {
    /// The raw entry path as stored in the archive.
    #[getset(get = "pub")]
    path: String,

    /// Whether the archive marks the entry as a directory.
    #[getset(get_copy = "pub")]
    is_directory: bool,

    /// The size of the entry's content in bytes.
    #[getset(get_copy = "pub")]
    size: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerEntry {
    /// Creates a new entry.
    pub fn new(path: impl Into<String>, is_directory: bool, size: u64) -> Self {
        Self {
            path: path.into(),
            is_directory,
            size,
        }
    }

    /// Creates a non-directory entry.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self::new(path, false, size)
    }

    /// Creates a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, true, 0)
    }
}
