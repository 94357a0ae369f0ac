//! Type-safe path newtypes.
//!
//! - [`AbsPath`]: an absolute path on the host filesystem.
//! - [`RelPath`]: a path relative to the destination directory (a target
//!   name, in engine terms).
//! - [`SourceRelPath`]: a path relative to the source directory, whose
//!   components still carry encoded attributes (`dot_profile`,
//!   `private_dot_ssh`, ...).
//!
//! `RelPath` and `SourceRelPath` are ordered byte-wise by component, which is
//! the order the engine walks and applies entries in.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An absolute path on the host filesystem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Creates an `AbsPath`, rejecting relative paths.
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_absolute() {
            Ok(AbsPath(path))
        } else {
            Err(Error::PathNotAbsolute { path })
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(path.to_path_buf())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn join(&self, rel: &RelPath) -> Self {
        AbsPath(self.0.join(rel.as_path()))
    }

    pub fn join_source(&self, rel: &SourceRelPath) -> Self {
        AbsPath(self.0.join(rel.as_path()))
    }

    /// Joins a single path component.
    pub fn join_name(&self, name: &str) -> Self {
        AbsPath(self.0.join(name))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    /// Strips `base` from the front of this path.
    pub fn strip_prefix(&self, base: &AbsPath) -> Result<RelPath> {
        self.0
            .strip_prefix(&base.0)
            .map(|p| RelPath(p.to_path_buf()))
            .map_err(|_| Error::NotUnderBase {
                path: self.0.clone(),
                base: base.0.clone(),
            })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

/// A path relative to the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Creates a `RelPath`, rejecting absolute paths.
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_relative() {
            Ok(RelPath(path))
        } else {
            Err(Error::PathNotRelative { path })
        }
    }

    /// The empty relative path, i.e. the destination directory itself.
    pub fn empty() -> Self {
        RelPath(PathBuf::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn join(&self, other: &RelPath) -> Self {
        RelPath(self.0.join(&other.0))
    }

    /// Joins a single path component.
    pub fn join_name(&self, name: &str) -> Self {
        RelPath(self.0.join(name))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| RelPath(p.to_path_buf()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }

    /// Returns whether `prefix` is a whole-component prefix of this path.
    pub fn starts_with(&self, prefix: &RelPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

/// A path relative to the source directory, with attributes still encoded in
/// its components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRelPath(PathBuf);

impl SourceRelPath {
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_relative() {
            Ok(SourceRelPath(path))
        } else {
            Err(Error::PathNotRelative { path })
        }
    }

    pub fn empty() -> Self {
        SourceRelPath(PathBuf::new())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn join_name(&self, name: &str) -> Self {
        SourceRelPath(self.0.join(name))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| SourceRelPath(p.to_path_buf()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

impl std::fmt::Display for AbsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl std::fmt::Display for SourceRelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
