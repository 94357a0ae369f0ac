//! Entry-kind include sets.
//!
//! A bitmask over entry kinds that gates which targets `apply` mutates and
//! which destination entries `add` imports.

use crate::entry::{DestStateEntry, TargetStateEntry};
use bitflags::bitflags;

bitflags! {
    /// The set of entry kinds an operation acts on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IncludeSet: u8 {
        const DIRS = 1 << 0;
        const FILES = 1 << 1;
        const SCRIPTS = 1 << 2;
        const SYMLINKS = 1 << 3;
    }
}

impl IncludeSet {
    /// Returns whether a target state entry is included.
    ///
    /// A target that collapsed to `Absent` under the empty-content policy is
    /// gated as a file, since it originated from a file entry.
    pub fn includes_target(&self, entry: &TargetStateEntry) -> bool {
        match entry {
            TargetStateEntry::Absent
            | TargetStateEntry::File { .. }
            | TargetStateEntry::Present { .. } => self.contains(IncludeSet::FILES),
            TargetStateEntry::Dir { .. } => self.contains(IncludeSet::DIRS),
            TargetStateEntry::Script { .. } => self.contains(IncludeSet::SCRIPTS),
            TargetStateEntry::Symlink { .. } => self.contains(IncludeSet::SYMLINKS),
        }
    }

    /// Returns whether a destination state entry is included.
    pub fn includes_dest(&self, entry: &DestStateEntry) -> bool {
        match entry {
            DestStateEntry::Absent { .. } | DestStateEntry::File { .. } => {
                self.contains(IncludeSet::FILES)
            }
            DestStateEntry::Dir { .. } => self.contains(IncludeSet::DIRS),
            DestStateEntry::Symlink { .. } => self.contains(IncludeSet::SYMLINKS),
        }
    }
}

impl Default for IncludeSet {
    fn default() -> Self {
        IncludeSet::all()
    }
}
