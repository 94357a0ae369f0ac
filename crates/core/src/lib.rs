//! Shared path types for the tansu dotfile engine.
//!
//! The engine juggles three kinds of paths: absolute paths on the host,
//! paths relative to the destination directory, and paths relative to the
//! source directory (whose components carry encoded attributes). Mixing them
//! up is the classic dotfile-manager bug, so each gets its own newtype.

pub mod error;
pub mod path;

pub use error::{Error, Result};
pub use path::{AbsPath, RelPath, SourceRelPath};
