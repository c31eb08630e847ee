//! Lexical handling of layer archive paths.
//!
//! Archive entry names are slash-separated regardless of the host, so everything here goes through
//! [`Utf8UnixPath`] and never consults the OS. The helpers follow the lexical rules tar producers
//! use: `dir` cleans what precedes the final slash, `base` ignores trailing slashes, and `clean`
//! collapses `.`, `..` and repeated separators.

use typed_path::{Utf8UnixComponent, Utf8UnixPath};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The basename prefix marking a whiteout entry.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// The basename of an opaque-directory whiteout marker.
pub const WHITEOUT_OPAQUE: &str = ".wh..wh..opq";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A raw archive path resolved to the path it occupies in the merged filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    /// The logical path. Directories keep their declared path verbatim.
    logical: String,

    /// Whether the entry is a whiteout marker.
    whiteout: bool,

    /// Whether the entry is a directory.
    directory: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NormalizedPath {
    /// Normalizes a raw archive entry path.
    ///
    /// Directories are keyed by their raw path (usually with a trailing slash) so that the
    /// directory entry itself never collides with a file or whiteout for the same name, which
    /// are keyed by their cleaned path.
    ///
    /// ## Examples
    ///
    /// ```
    /// use chaff::overlay::NormalizedPath;
    ///
    /// let path = NormalizedPath::new("usr/lib/.wh.libfoo.so", false);
    /// assert!(path.is_whiteout());
    /// assert_eq!(path.logical(), "usr/lib/libfoo.so");
    ///
    /// let dir = NormalizedPath::new("usr/lib/", true);
    /// assert_eq!(dir.logical(), "usr/lib/");
    /// ```
    pub fn new(raw: &str, directory: bool) -> Self {
        let basename = base(raw);
        let whiteout = basename.starts_with(WHITEOUT_PREFIX);

        let logical = if directory {
            raw.to_string()
        } else {
            let name = if whiteout {
                &basename[WHITEOUT_PREFIX.len()..]
            } else {
                basename
            };
            join(&dir(raw), name)
        };

        Self {
            logical,
            whiteout,
            directory,
        }
    }

    /// Returns the logical path.
    pub fn logical(&self) -> &str {
        &self.logical
    }

    /// Returns true if the entry is a whiteout marker.
    pub fn is_whiteout(&self) -> bool {
        self.whiteout
    }

    /// Returns true if the entry is an opaque-directory whiteout marker.
    pub fn is_opaque_whiteout(&self) -> bool {
        self.whiteout && base(&self.logical) == &WHITEOUT_OPAQUE[WHITEOUT_PREFIX.len()..]
    }

    /// Returns true if the entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Consumes the path and returns the logical path.
    pub fn into_logical(self) -> String {
        self.logical
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the shortest path lexically equivalent to `path`.
///
/// An empty result becomes `"."`. A rooted path never climbs above `/`.
pub fn clean(path: &str) -> String {
    let path = Utf8UnixPath::new(path);
    let rooted = path.has_root();
    let mut parts: Vec<&str> = Vec::new();

    for component in path.components() {
        match component {
            Utf8UnixComponent::RootDir | Utf8UnixComponent::CurDir => {}
            Utf8UnixComponent::ParentDir => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            Utf8UnixComponent::Normal(name) => parts.push(name),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Returns all but the last element of `path`, cleaned.
///
/// A trailing slash counts as an empty last element, so `dir("usr/bin/")` is `"usr/bin"`.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean(&path[..=idx]),
        None => ".".to_string(),
    }
}

/// Returns the last element of `path`, ignoring trailing slashes.
pub fn base(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }

    // `file_name` skips a trailing `.` and yields nothing for `..`; both are their own base.
    match trimmed.rsplit('/').next() {
        Some(last @ ("." | "..")) => last,
        _ => Utf8UnixPath::new(trimmed).file_name().unwrap_or(trimmed),
    }
}

/// Joins two path elements and cleans the result. Empty elements are ignored.
pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean(name),
        (false, true) => clean(dir),
        (false, false) => clean(&format!("{dir}/{name}")),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_clean() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("."), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("usr//bin/"), "usr/bin");
        assert_eq!(clean("./usr/./bin"), "usr/bin");
        assert_eq!(clean("usr/lib/../bin"), "usr/bin");
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("a/.."), ".");
        assert_eq!(clean("a/b/../../.."), "..");
        assert_eq!(clean("//usr/.wh.bin"), "/usr/.wh.bin");
    }

    #[test]
    fn test_path_dir() {
        assert_eq!(dir("usr/bin/ls"), "usr/bin");
        assert_eq!(dir("usr/bin/"), "usr/bin");
        assert_eq!(dir("ls"), ".");
        assert_eq!(dir("/ls"), "/");
        assert_eq!(dir("/"), "/");
        assert_eq!(dir("."), ".");
        assert_eq!(dir(""), ".");
    }

    #[test]
    fn test_path_base() {
        assert_eq!(base("usr/bin/ls"), "ls");
        assert_eq!(base("usr/bin/"), "bin");
        assert_eq!(base("ls"), "ls");
        assert_eq!(base("/"), "/");
        assert_eq!(base("///"), "/");
        assert_eq!(base(""), ".");
        assert_eq!(base("a/."), ".");
        assert_eq!(base("a/../"), "..");
        assert_eq!(base("etc/.wh..wh..opq"), ".wh..wh..opq");
    }

    #[test]
    fn test_path_join() {
        assert_eq!(join("usr", "bin"), "usr/bin");
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("", ""), "");
        assert_eq!(join("", "a/"), "a");
    }

    #[test]
    fn test_path_normalize_regular_file() {
        let path = NormalizedPath::new("./etc/passwd", false);
        assert_eq!(path.logical(), "etc/passwd");
        assert!(!path.is_whiteout());
        assert!(!path.is_directory());
    }

    #[test]
    fn test_path_normalize_whiteout_file() {
        let path = NormalizedPath::new("etc/.wh.passwd", false);
        assert_eq!(path.logical(), "etc/passwd");
        assert!(path.is_whiteout());
        assert!(!path.is_opaque_whiteout());

        let root = NormalizedPath::new(".wh.tmp", false);
        assert_eq!(root.logical(), "tmp");
        assert!(root.is_whiteout());
    }

    #[test]
    fn test_path_normalize_directory_keeps_raw_path() {
        let path = NormalizedPath::new("./var/cache/", true);
        assert_eq!(path.logical(), "./var/cache/");
        assert!(path.is_directory());
        assert!(!path.is_whiteout());
    }

    #[test]
    fn test_path_normalize_opaque_marker() {
        let path = NormalizedPath::new("var/cache/.wh..wh..opq", false);
        assert!(path.is_whiteout());
        assert!(path.is_opaque_whiteout());
        assert_eq!(path.logical(), "var/cache/.wh..opq");
    }

    #[test]
    fn test_path_normalize_degenerate_inputs() {
        assert_eq!(NormalizedPath::new("", false).logical(), ".");
        assert_eq!(NormalizedPath::new("/", false).logical(), "/");
        assert_eq!(NormalizedPath::new("/", true).logical(), "/");

        let bare = NormalizedPath::new("/.wh.", false);
        assert!(bare.is_whiteout());
        assert_eq!(bare.logical(), "/");
    }
}
