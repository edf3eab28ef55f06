//! Destination path types and parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, storage-relative destination path for an upload.
///
/// Paths are stored without a leading `/` and use `/` as separator.
/// Empty segments and `.` are dropped; `..` is rejected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DestinationPath(String);

impl DestinationPath {
    /// Parse a destination path.
    pub fn parse(path: &str) -> crate::Result<Self> {
        if path.contains('\0') {
            return Err(crate::Error::InvalidPath(
                "path contains a NUL byte".to_string(),
            ));
        }

        let mut segments = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(crate::Error::InvalidPath(format!(
                        "path traversal not allowed: {path}"
                    )));
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(crate::Error::InvalidPath(format!(
                "path has no file name: {path:?}"
            )));
        }

        Ok(Self(segments.join("/")))
    }

    /// Join a folder and a file name the way the explorer upload form does:
    /// `<folder>/<file_name>`, with the folder defaulting to the root.
    pub fn join(folder: Option<&str>, file_name: &str) -> crate::Result<Self> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(crate::Error::InvalidPath(format!(
                "invalid file name: {file_name:?}"
            )));
        }
        let folder = folder.unwrap_or("/");
        Self::parse(&format!("{folder}/{file_name}"))
    }

    /// Get the path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for DestinationPath {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<DestinationPath> for String {
    fn from(value: DestinationPath) -> Self {
        value.0
    }
}

impl fmt::Debug for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationPath({})", self.0)
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
