//! Dry-run decorator.
//!
//! Reads delegate to the wrapped system; mutations are recorded as
//! [`Operation`]s and succeed without touching it. The recorded operation
//! log is what an external diff renderer consumes.

use crate::error::Result;
use crate::system::{DirEntry, Stat, System};
use std::cell::RefCell;
use tansu_core::AbsPath;

/// A mutation that would have been performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Mkdir { path: AbsPath, perm: u32 },
    WriteFile { path: AbsPath, contents: Vec<u8>, perm: u32 },
    WriteSymlink { path: AbsPath, linkname: String },
    Chmod { path: AbsPath, perm: u32 },
    Rename { old_path: AbsPath, new_path: AbsPath },
    RemoveAll { path: AbsPath },
    RunCmd { cmd: String },
    RunScript { name: String },
    Set { bucket: String, key: Vec<u8> },
    Delete { bucket: String, key: Vec<u8> },
}

/// A system that records mutations instead of performing them.
pub struct DryRunSystem<S> {
    inner: S,
    operations: RefCell<Vec<Operation>>,
}

impl<S: System> DryRunSystem<S> {
    pub fn new(inner: S) -> Self {
        DryRunSystem {
            inner,
            operations: RefCell::new(Vec::new()),
        }
    }

    /// The mutations recorded so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.borrow().clone()
    }

    /// Returns whether any mutation was attempted.
    pub fn is_mutated(&self) -> bool {
        !self.operations.borrow().is_empty()
    }

    fn record(&self, operation: Operation) {
        self.operations.borrow_mut().push(operation);
    }
}

impl<S: System> System for DryRunSystem<S> {
    fn lstat(&self, path: &AbsPath) -> Result<Stat> {
        self.inner.lstat(path)
    }

    fn stat(&self, path: &AbsPath) -> Result<Stat> {
        self.inner.stat(path)
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn read_link(&self, path: &AbsPath) -> Result<String> {
        self.inner.read_link(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<AbsPath>> {
        self.inner.glob(pattern)
    }

    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        self.inner.raw_path(path)
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        self.record(Operation::Mkdir {
            path: path.clone(),
            perm,
        });
        Ok(())
    }

    fn write_file(&self, path: &AbsPath, contents: &[u8], perm: u32) -> Result<()> {
        self.record(Operation::WriteFile {
            path: path.clone(),
            contents: contents.to_vec(),
            perm,
        });
        Ok(())
    }

    fn write_symlink(&self, linkname: &str, path: &AbsPath) -> Result<()> {
        self.record(Operation::WriteSymlink {
            path: path.clone(),
            linkname: linkname.to_owned(),
        });
        Ok(())
    }

    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        self.record(Operation::Chmod {
            path: path.clone(),
            perm,
        });
        Ok(())
    }

    fn rename(&self, old_path: &AbsPath, new_path: &AbsPath) -> Result<()> {
        self.record(Operation::Rename {
            old_path: old_path.clone(),
            new_path: new_path.clone(),
        });
        Ok(())
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::RemoveAll { path: path.clone() });
        Ok(())
    }

    fn run_cmd(&self, cmd: &str, _dir: &AbsPath) -> Result<()> {
        self.record(Operation::RunCmd {
            cmd: cmd.to_owned(),
        });
        Ok(())
    }

    fn run_script(&self, name: &str, _dir: &AbsPath, _contents: &[u8]) -> Result<()> {
        self.record(Operation::RunScript {
            name: name.to_owned(),
        });
        Ok(())
    }

    fn idempotent_cmd_output(&self, cmd: &str) -> Result<Vec<u8>> {
        self.inner.idempotent_cmd_output(cmd)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], _value: &[u8]) -> Result<()> {
        self.record(Operation::Set {
            bucket: bucket.to_owned(),
            key: key.to_vec(),
        });
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.record(Operation::Delete {
            bucket: bucket.to_owned(),
            key: key.to_vec(),
        });
        Ok(())
    }
}
