//! Error types for the engine.
//!
//! Structural filesystem failures (`NotFound`, `Exists`, `PermissionDenied`)
//! are split out from generic `Io` so callers can match on them; the rest of
//! the variants map one-to-one onto the failure modes of the source-state
//! pipeline.

use std::io;
use tansu_core::{AbsPath, RelPath};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: AbsPath,
        #[source]
        source: io::Error,
    },

    #[error("{path}: not found")]
    NotFound { path: AbsPath },

    #[error("{path}: already exists")]
    Exists { path: AbsPath },

    #[error("{path}: permission denied")]
    PermissionDenied { path: AbsPath },

    /// A mutating operation was attempted on a system that refuses it, such
    /// as a read-only or dump system.
    #[error("{operation}: permission denied")]
    OperationNotPermitted { operation: &'static str },

    #[error("{path}: unsupported file type {file_type}")]
    UnsupportedFileType { path: AbsPath, file_type: String },

    #[error("{path}: unknown format")]
    UnknownFormat { path: AbsPath },

    #[error("{path}: not a directory")]
    NotADirectory { path: AbsPath },

    /// Malformed template data, pattern, version, or file name. `name`
    /// identifies the offending input, usually a source path.
    #[error("{name}: {message}")]
    Parse { name: String, message: String },

    #[error("{target_name}: duplicate target ({})", join_paths(.source_paths))]
    DuplicateTarget {
        target_name: RelPath,
        source_paths: Vec<AbsPath>,
    },

    #[error("{target_name}: no source state entry")]
    EntryNotFound { target_name: RelPath },

    #[error("{key:?}: invalid template data key")]
    InvalidKey { key: String },

    #[error("{attribute}: unknown attribute")]
    UnknownAttribute { attribute: String },

    #[error(transparent)]
    Template(#[from] tansu_template::Error),

    #[error("{path}: decryption failed: {message}")]
    Decryption { path: AbsPath, message: String },

    #[error("{command}: {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{name}: script failed: {source}")]
    Script {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("persistent state: {message}")]
    State { message: String },

    #[error("{message}")]
    Unsupported { message: String },

    #[error("source state requires version {required}, engine version is {running}")]
    Version {
        required: semver::Version,
        running: semver::Version,
    },

    #[error(transparent)]
    Path(#[from] tansu_core::Error),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Maps an I/O error to the structural variant for its kind.
    pub fn io(path: &AbsPath, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path: path.clone() },
            io::ErrorKind::AlreadyExists => Error::Exists { path: path.clone() },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path: path.clone() },
            _ => Error::Io {
                path: path.clone(),
                source,
            },
        }
    }

    /// Collapses a non-empty list of errors, unwrapping a singleton.
    pub fn multiple(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Multiple(errors)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

fn join_paths(paths: &[AbsPath]) -> String {
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
