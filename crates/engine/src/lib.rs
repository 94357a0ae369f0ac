//! # tansu engine
//!
//! The source-state engine of the tansu dotfile manager. A source directory
//! whose basenames encode file metadata is read into a source state,
//! composed with ignore/remove pattern sets, template data, and partials,
//! and reconciled against a destination directory through a pluggable
//! filesystem abstraction.
//!
//! - [`attr`]: the basename ↔ attributes codec
//! - [`source`]: reading, evaluating, and applying the source state
//! - [`entry`]: target and destination state entries
//! - [`system`]: the filesystem abstraction and its decorators
//! - [`store`]: the persistent bucket/key byte store
//! - [`patternset`], [`include`], [`content`], [`chattr`]: supporting pieces

pub mod attr;
pub mod chattr;
pub mod content;
pub mod entry;
pub mod error;
pub mod include;
pub mod patternset;
pub mod source;
pub mod store;
pub mod system;

// Re-export path types from core.
pub use tansu_core::{AbsPath, RelPath, SourceRelPath};

pub use attr::{DirAttributes, FileAttributes, SourceFileKind};
pub use chattr::AttributeModifiers;
pub use content::{EncryptionTool, LazyContents, NullEncryptionTool};
pub use entry::{DestStateEntry, TargetStateEntry};
pub use error::{Error, Result};
pub use include::IncludeSet;
pub use patternset::PatternSet;
pub use source::{AddOptions, DEFAULT_UMASK, SourceState, SourceStateEntry};
pub use store::{
    MockPersistentState, NullPersistentState, PersistentState, RedbPersistentState,
    SCRIPT_STATE_BUCKET,
};
pub use system::{
    DirEntry, DryRunSystem, DumpEntry, DumpSystem, Operation, ReadOnlySystem, RealSystem, Stat,
    StatKind, System,
};
