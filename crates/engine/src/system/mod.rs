//! Filesystem abstraction.
//!
//! A [`System`] is the uniform byte-level interface the engine mutates the
//! world through: filesystem reads and writes, command and script execution,
//! and a bucketed persistent key-value store. Concrete backends are selected
//! at construction; decorators wrap another system by value.
//!
//! - [`RealSystem`]: the host filesystem plus an injected persistent state.
//! - [`ReadOnlySystem`]: reads delegate, mutations fail with permission
//!   denied.
//! - [`DumpSystem`]: mutations accumulate into serializable records, reads
//!   fail.
//! - [`DryRunSystem`]: reads delegate, mutations are recorded and succeed
//!   without effect.

mod dryrun;
mod dump;
mod readonly;
mod real;

pub use dryrun::{DryRunSystem, Operation};
pub use dump::{DumpEntry, DumpSystem};
pub use readonly::ReadOnlySystem;
pub use real::RealSystem;

use crate::error::Result;
use tansu_core::AbsPath;

/// What a path is, as reported by `lstat`/`stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatKind {
    File,
    Dir,
    Symlink,
    /// Sockets, fifos, devices. Carries a human-readable type name.
    Other(String),
}

/// File metadata the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub kind: StatKind,
    /// Permission bits (`mode & 0o7777`).
    pub perm: u32,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.kind == StatKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == StatKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == StatKind::Symlink
    }
}

/// A directory entry returned by [`System::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub stat: Stat,
}

/// The uniform interface over filesystem, command, and store operations.
pub trait System {
    fn lstat(&self, path: &AbsPath) -> Result<Stat>;
    fn stat(&self, path: &AbsPath) -> Result<Stat>;
    /// Reads a directory; entries are sorted ascending by name, byte-wise.
    fn read_dir(&self, path: &AbsPath) -> Result<Vec<DirEntry>>;
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>>;
    fn read_link(&self, path: &AbsPath) -> Result<String>;
    /// Expands a glob pattern (`**` spans directories); matches are sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<AbsPath>>;
    /// Resolves a path to the one the host filesystem sees.
    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        Ok(path.clone())
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()>;
    fn write_file(&self, path: &AbsPath, contents: &[u8], perm: u32) -> Result<()>;
    /// Creates or replaces a symlink at `path` pointing at `linkname`.
    fn write_symlink(&self, linkname: &str, path: &AbsPath) -> Result<()>;
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()>;
    fn rename(&self, old_path: &AbsPath, new_path: &AbsPath) -> Result<()>;
    /// Removes a path recursively. A missing path is not an error.
    fn remove_all(&self, path: &AbsPath) -> Result<()>;

    fn run_cmd(&self, cmd: &str, dir: &AbsPath) -> Result<()>;
    /// Runs script `contents` with `dir` as working directory. `name` is
    /// only used for diagnostics.
    fn run_script(&self, name: &str, dir: &AbsPath, contents: &[u8]) -> Result<()>;
    /// Runs a command the caller asserts has no side effects; the output may
    /// be cached for the lifetime of the system.
    fn idempotent_cmd_output(&self, cmd: &str) -> Result<Vec<u8>>;

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;
}

impl<S: System + ?Sized> System for &S {
    fn lstat(&self, path: &AbsPath) -> Result<Stat> {
        (**self).lstat(path)
    }

    fn stat(&self, path: &AbsPath) -> Result<Stat> {
        (**self).stat(path)
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<DirEntry>> {
        (**self).read_dir(path)
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn read_link(&self, path: &AbsPath) -> Result<String> {
        (**self).read_link(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<AbsPath>> {
        (**self).glob(pattern)
    }

    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        (**self).raw_path(path)
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        (**self).mkdir(path, perm)
    }

    fn write_file(&self, path: &AbsPath, contents: &[u8], perm: u32) -> Result<()> {
        (**self).write_file(path, contents, perm)
    }

    fn write_symlink(&self, linkname: &str, path: &AbsPath) -> Result<()> {
        (**self).write_symlink(linkname, path)
    }

    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        (**self).chmod(path, perm)
    }

    fn rename(&self, old_path: &AbsPath, new_path: &AbsPath) -> Result<()> {
        (**self).rename(old_path, new_path)
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        (**self).remove_all(path)
    }

    fn run_cmd(&self, cmd: &str, dir: &AbsPath) -> Result<()> {
        (**self).run_cmd(cmd, dir)
    }

    fn run_script(&self, name: &str, dir: &AbsPath, contents: &[u8]) -> Result<()> {
        (**self).run_script(name, dir, contents)
    }

    fn idempotent_cmd_output(&self, cmd: &str) -> Result<Vec<u8>> {
        (**self).idempotent_cmd_output(cmd)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(bucket, key, value)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        (**self).delete(bucket, key)
    }
}
