//! Attribute parsing and encoding.
//!
//! Source basenames encode the metadata of their target in a fixed prefix
//! grammar. Directories use `exact_`, `private_`, and `dot_`; files compose
//! `encrypted_`, `private_`, `empty_`, `exists_`, `executable_`, `run_`
//! (optionally followed by `once_`), and `symlink_`, in that order, followed
//! by the `dot_` translation of the leading `.` and an optional `.tmpl`
//! suffix.
//!
//! Decoding consumes recognized prefixes in the same order and leaves
//! anything it does not recognize in the target name, so every basename the
//! encoder can produce decodes back to the same attributes, and every
//! decoded basename re-encodes byte-for-byte.
//!
//! ```
//! use tansu_engine::attr::{FileAttributes, SourceFileKind};
//!
//! let attrs = FileAttributes::parse("private_dot_netrc.tmpl");
//! assert_eq!(attrs.name, ".netrc");
//! assert_eq!(attrs.kind, SourceFileKind::File);
//! assert!(attrs.private && attrs.template);
//! assert_eq!(attrs.source_name(), "private_dot_netrc.tmpl");
//! ```

const DOT_PREFIX: &str = "dot_";
const EMPTY_PREFIX: &str = "empty_";
const ENCRYPTED_PREFIX: &str = "encrypted_";
const EXACT_PREFIX: &str = "exact_";
const EXECUTABLE_PREFIX: &str = "executable_";
const EXISTS_PREFIX: &str = "exists_";
const ONCE_PREFIX: &str = "once_";
const PRIVATE_PREFIX: &str = "private_";
const RUN_PREFIX: &str = "run_";
const SYMLINK_PREFIX: &str = "symlink_";

/// Suffix marking a source file as a template.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// The kind of target a source file produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFileKind {
    /// An ordinary file whose contents are authoritative.
    File,
    /// A file that must exist; contents apply only on creation.
    Present,
    /// A script run during apply, with no on-disk form in the destination.
    Script,
    /// A symbolic link whose source contents are the link target.
    Symlink,
}

/// Attributes encoded in a source directory basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirAttributes {
    /// Target name, with the `dot_` prefix already translated to `.`.
    pub name: String,
    pub exact: bool,
    pub private: bool,
}

impl DirAttributes {
    /// Decodes a source directory basename.
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let mut exact = false;
        let mut private = false;
        if let Some(rest) = name.strip_prefix(EXACT_PREFIX) {
            exact = true;
            name = rest;
        }
        if let Some(rest) = name.strip_prefix(PRIVATE_PREFIX) {
            private = true;
            name = rest;
        }
        DirAttributes {
            name: translate_dot(name),
            exact,
            private,
        }
    }

    /// Encodes these attributes back into a source basename.
    pub fn source_name(&self) -> String {
        let mut s = String::new();
        if self.exact {
            s.push_str(EXACT_PREFIX);
        }
        if self.private {
            s.push_str(PRIVATE_PREFIX);
        }
        push_dot_translated(&mut s, &self.name);
        s
    }

    /// The directory permission before the umask is applied.
    pub fn perm(&self) -> u32 {
        if self.private { 0o700 } else { 0o777 }
    }
}

/// Attributes encoded in a source file basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileAttributes {
    /// Target name, with the `dot_` prefix already translated to `.`.
    pub name: String,
    pub kind: SourceFileKind,
    /// Keep the target even when its contents resolve to zero bytes.
    /// Only meaningful for [`SourceFileKind::File`].
    pub empty: bool,
    pub encrypted: bool,
    pub executable: bool,
    pub private: bool,
    pub template: bool,
    /// Run the script at most once, keyed by its content hash.
    pub once: bool,
}

impl FileAttributes {
    /// Decodes a source file basename.
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let mut attrs = FileAttributes {
            name: String::new(),
            kind: SourceFileKind::File,
            empty: false,
            encrypted: false,
            executable: false,
            private: false,
            template: false,
            once: false,
        };
        if let Some(rest) = name.strip_prefix(ENCRYPTED_PREFIX) {
            attrs.encrypted = true;
            name = rest;
        }
        if let Some(rest) = name.strip_prefix(PRIVATE_PREFIX) {
            attrs.private = true;
            name = rest;
        }
        if let Some(rest) = name.strip_prefix(EMPTY_PREFIX) {
            attrs.empty = true;
            name = rest;
        }
        if let Some(rest) = name.strip_prefix(EXISTS_PREFIX) {
            attrs.kind = SourceFileKind::Present;
            name = rest;
        }
        if let Some(rest) = name.strip_prefix(EXECUTABLE_PREFIX) {
            attrs.executable = true;
            name = rest;
        }
        if attrs.kind == SourceFileKind::File {
            if let Some(rest) = name.strip_prefix(RUN_PREFIX) {
                attrs.kind = SourceFileKind::Script;
                name = rest;
                if let Some(rest) = name.strip_prefix(ONCE_PREFIX) {
                    attrs.once = true;
                    name = rest;
                }
            } else if let Some(rest) = name.strip_prefix(SYMLINK_PREFIX) {
                attrs.kind = SourceFileKind::Symlink;
                name = rest;
            }
        }
        let mut target = translate_dot(name);
        if let Some(stripped) = target.strip_suffix(TEMPLATE_SUFFIX) {
            attrs.template = true;
            target.truncate(stripped.len());
        }
        attrs.name = target;
        attrs
    }

    /// Encodes these attributes back into a source basename.
    pub fn source_name(&self) -> String {
        let mut s = String::new();
        if self.encrypted {
            s.push_str(ENCRYPTED_PREFIX);
        }
        if self.private {
            s.push_str(PRIVATE_PREFIX);
        }
        if self.empty {
            s.push_str(EMPTY_PREFIX);
        }
        if self.kind == SourceFileKind::Present {
            s.push_str(EXISTS_PREFIX);
        }
        if self.executable {
            s.push_str(EXECUTABLE_PREFIX);
        }
        if self.kind == SourceFileKind::Script {
            s.push_str(RUN_PREFIX);
            if self.once {
                s.push_str(ONCE_PREFIX);
            }
        }
        if self.kind == SourceFileKind::Symlink {
            s.push_str(SYMLINK_PREFIX);
        }
        push_dot_translated(&mut s, &self.name);
        if self.template {
            s.push_str(TEMPLATE_SUFFIX);
        }
        s
    }

    /// The file permission before the umask is applied.
    pub fn perm(&self) -> u32 {
        let mut perm = 0o666;
        if self.executable {
            perm |= 0o111;
        }
        if self.private {
            perm &= !0o77;
        }
        perm
    }
}

fn translate_dot(name: &str) -> String {
    match name.strip_prefix(DOT_PREFIX) {
        Some(rest) => format!(".{rest}"),
        None => name.to_owned(),
    }
}

fn push_dot_translated(s: &mut String, name: &str) {
    match name.strip_prefix('.') {
        Some(rest) => {
            s.push_str(DOT_PREFIX);
            s.push_str(rest);
        }
        None => s.push_str(name),
    }
}
