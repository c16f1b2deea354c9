//! Block identifiers.
//!
//! The backend addresses blocks by strings of the form
//! `"{file}__{child}/{child}/..."`. The root block of a file is just the file
//! path. Drive-letter colons are escaped as `---DRIVE` so that ids survive
//! being embedded in other paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the file path and the child path.
const FILE_SEPARATOR: &str = "__";

/// Escape sequence the backend uses in place of `:`.
const DRIVE_ESCAPE: &str = "---DRIVE";

/// Address of one block inside an opened resource.
///
/// Stable for the life of the open resource. Serializes as a plain string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wrap a raw id string as sent by the backend.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Root block id for a file on disk.
    pub fn for_file(path: &str) -> Self {
        Self(path.replace('\\', "/").replace(':', DRIVE_ESCAPE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file this block lives in, with drive escapes undone.
    pub fn file_path(&self) -> String {
        let file = match self.0.split_once(FILE_SEPARATOR) {
            Some((file, _)) => file,
            None => &self.0,
        };
        file.replace(DRIVE_ESCAPE, ":")
    }

    /// Child path segments below the file root (empty for the root block).
    pub fn segments(&self) -> Vec<&str> {
        match self.0.split_once(FILE_SEPARATOR) {
            Some((_, rest)) => rest.split('/').filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments().is_empty()
    }

    /// Id of a named child of this block.
    pub fn child(&self, name: &str) -> Self {
        if self.0.contains(FILE_SEPARATOR) {
            Self(format!("{}/{}", self.0, name))
        } else {
            Self(format!("{}{}{}", self.0, FILE_SEPARATOR, name))
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Tests
// ============================================================================
