//! Attribute modifiers for source-side renames.
//!
//! Modifiers are a comma-separated list of `[+|-|no]<attribute>` items; an
//! omitted sign sets the attribute. Each attribute is a tri-state: set,
//! leave unchanged, or clear.

use crate::attr::{DirAttributes, FileAttributes, SourceFileKind};
use crate::error::{Error, Result};

/// How a single attribute is changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolModifier {
    Set,
    #[default]
    Leave,
    Clear,
}

impl BoolModifier {
    pub fn modify(self, value: bool) -> bool {
        match self {
            BoolModifier::Set => true,
            BoolModifier::Leave => value,
            BoolModifier::Clear => false,
        }
    }

    /// Returns whether applying this modifier to `value` would change it.
    pub fn changes(self, value: bool) -> bool {
        self.modify(value) != value
    }
}

/// A parsed set of attribute modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeModifiers {
    pub empty: BoolModifier,
    pub encrypted: BoolModifier,
    pub exact: BoolModifier,
    pub executable: BoolModifier,
    pub private: BoolModifier,
    pub template: BoolModifier,
}

impl AttributeModifiers {
    /// Parses a modifier list such as `+x,noempty,private,-t`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut modifiers = AttributeModifiers::default();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (modifier, attribute) = if let Some(rest) = part.strip_prefix('-') {
                (BoolModifier::Clear, rest)
            } else if let Some(rest) = part.strip_prefix('+') {
                (BoolModifier::Set, rest)
            } else if let Some(rest) = part.strip_prefix("no") {
                (BoolModifier::Clear, rest)
            } else {
                (BoolModifier::Set, part)
            };
            match attribute {
                "empty" | "e" => modifiers.empty = modifier,
                "encrypted" => modifiers.encrypted = modifier,
                "exact" => modifiers.exact = modifier,
                "executable" | "x" => modifiers.executable = modifier,
                "private" | "p" => modifiers.private = modifier,
                "template" | "t" => modifiers.template = modifier,
                _ => {
                    return Err(Error::UnknownAttribute {
                        attribute: attribute.to_owned(),
                    });
                }
            }
        }
        Ok(modifiers)
    }

    pub fn apply_dir(&self, attrs: &DirAttributes) -> DirAttributes {
        DirAttributes {
            name: attrs.name.clone(),
            exact: self.exact.modify(attrs.exact),
            private: self.private.modify(attrs.private),
        }
    }

    /// Applies the modifiers to file attributes.
    ///
    /// Changing the encrypted attribute would require re-encrypting the
    /// source contents and is refused; scripts have no modifiable
    /// attributes.
    pub fn apply_file(&self, attrs: &FileAttributes) -> Result<FileAttributes> {
        if self.encrypted.changes(attrs.encrypted) {
            return Err(Error::Unsupported {
                message: "changing the encrypted attribute is not supported".to_owned(),
            });
        }
        let mut new_attrs = attrs.clone();
        match attrs.kind {
            SourceFileKind::File => {
                new_attrs.empty = self.empty.modify(attrs.empty);
                new_attrs.executable = self.executable.modify(attrs.executable);
                new_attrs.private = self.private.modify(attrs.private);
                new_attrs.template = self.template.modify(attrs.template);
            }
            SourceFileKind::Present => {
                new_attrs.executable = self.executable.modify(attrs.executable);
                new_attrs.private = self.private.modify(attrs.private);
                new_attrs.template = self.template.modify(attrs.template);
            }
            SourceFileKind::Symlink => {
                new_attrs.template = self.template.modify(attrs.template);
            }
            SourceFileKind::Script => {
                return Err(Error::Unsupported {
                    message: "changing script attributes is not supported".to_owned(),
                });
            }
        }
        Ok(new_attrs)
    }
}
