//! Read-only decorator.

use crate::error::{Error, Result};
use crate::system::{DirEntry, Stat, System};
use tansu_core::AbsPath;

/// A system that delegates reads and refuses every mutation.
pub struct ReadOnlySystem<S> {
    inner: S,
}

impl<S: System> ReadOnlySystem<S> {
    pub fn new(inner: S) -> Self {
        ReadOnlySystem { inner }
    }
}

impl<S: System> System for ReadOnlySystem<S> {
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

    fn mkdir(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(Error::PermissionDenied { path: path.clone() })
    }

    fn write_file(&self, path: &AbsPath, _contents: &[u8], _perm: u32) -> Result<()> {
        Err(Error::PermissionDenied { path: path.clone() })
    }

    fn write_symlink(&self, _linkname: &str, path: &AbsPath) -> Result<()> {
        Err(Error::PermissionDenied { path: path.clone() })
    }

    fn chmod(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(Error::PermissionDenied { path: path.clone() })
    }

    fn rename(&self, old_path: &AbsPath, _new_path: &AbsPath) -> Result<()> {
        Err(Error::PermissionDenied {
            path: old_path.clone(),
        })
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        Err(Error::PermissionDenied { path: path.clone() })
    }

    fn run_cmd(&self, _cmd: &str, _dir: &AbsPath) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "run_cmd" })
    }

    fn run_script(&self, _name: &str, _dir: &AbsPath, _contents: &[u8]) -> Result<()> {
        Err(Error::OperationNotPermitted {
            operation: "run_script",
        })
    }

    fn idempotent_cmd_output(&self, cmd: &str) -> Result<Vec<u8>> {
        self.inner.idempotent_cmd_output(cmd)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "set" })
    }

    fn delete(&self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "delete" })
    }
}
