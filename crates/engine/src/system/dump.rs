//! Dump decorator.
//!
//! Accumulates every mutation into an in-memory map of typed records so the
//! target state can be serialized instead of applied. The destination is
//! treated as empty (`lstat` reports not-found, `read_dir` nothing), and
//! content reads fail: a dump must be produced from the source state alone.

use crate::error::{Error, Result};
use crate::system::{DirEntry, Stat, System};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tansu_core::AbsPath;

/// A recorded mutation, keyed by path in [`DumpSystem::data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DumpEntry {
    Dir { name: String, perm: u32 },
    File { name: String, perm: u32, contents: String },
    Script { name: String, contents: String },
    Symlink { name: String, linkname: String },
}

/// A system that records mutations for serialization.
#[derive(Debug, Default)]
pub struct DumpSystem {
    data: RefCell<BTreeMap<String, DumpEntry>>,
}

impl DumpSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated records, keyed by path.
    pub fn data(&self) -> BTreeMap<String, DumpEntry> {
        self.data.borrow().clone()
    }

    fn insert(&self, path: &AbsPath, entry: DumpEntry) -> Result<()> {
        let mut data = self.data.borrow_mut();
        let name = path.to_string();
        if data.contains_key(&name) {
            return Err(Error::Exists { path: path.clone() });
        }
        data.insert(name, entry);
        Ok(())
    }
}

impl System for DumpSystem {
    fn lstat(&self, path: &AbsPath) -> Result<Stat> {
        Err(Error::NotFound { path: path.clone() })
    }

    fn stat(&self, path: &AbsPath) -> Result<Stat> {
        Err(Error::NotFound { path: path.clone() })
    }

    fn read_dir(&self, _path: &AbsPath) -> Result<Vec<DirEntry>> {
        Ok(Vec::new())
    }

    fn read_file(&self, _path: &AbsPath) -> Result<Vec<u8>> {
        Err(Error::OperationNotPermitted {
            operation: "read_file",
        })
    }

    fn read_link(&self, _path: &AbsPath) -> Result<String> {
        Err(Error::OperationNotPermitted {
            operation: "read_link",
        })
    }

    fn glob(&self, _pattern: &str) -> Result<Vec<AbsPath>> {
        Err(Error::OperationNotPermitted { operation: "glob" })
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        self.insert(
            path,
            DumpEntry::Dir {
                name: path.to_string(),
                perm,
            },
        )
    }

    fn write_file(&self, path: &AbsPath, contents: &[u8], perm: u32) -> Result<()> {
        self.insert(
            path,
            DumpEntry::File {
                name: path.to_string(),
                perm,
                contents: String::from_utf8_lossy(contents).into_owned(),
            },
        )
    }

    fn write_symlink(&self, linkname: &str, path: &AbsPath) -> Result<()> {
        self.insert(
            path,
            DumpEntry::Symlink {
                name: path.to_string(),
                linkname: linkname.to_owned(),
            },
        )
    }

    fn chmod(&self, _path: &AbsPath, _perm: u32) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "chmod" })
    }

    fn rename(&self, _old_path: &AbsPath, _new_path: &AbsPath) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "rename" })
    }

    fn remove_all(&self, _path: &AbsPath) -> Result<()> {
        Err(Error::OperationNotPermitted {
            operation: "remove_all",
        })
    }

    fn run_cmd(&self, _cmd: &str, _dir: &AbsPath) -> Result<()> {
        Ok(())
    }

    fn run_script(&self, name: &str, _dir: &AbsPath, contents: &[u8]) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if data.contains_key(name) {
            return Err(Error::State {
                message: format!("{name}: script already recorded"),
            });
        }
        data.insert(
            name.to_owned(),
            DumpEntry::Script {
                name: name.to_owned(),
                contents: String::from_utf8_lossy(contents).into_owned(),
            },
        );
        Ok(())
    }

    fn idempotent_cmd_output(&self, _cmd: &str) -> Result<Vec<u8>> {
        Err(Error::OperationNotPermitted {
            operation: "idempotent_cmd_output",
        })
    }

    fn get(&self, _bucket: &str, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Err(Error::OperationNotPermitted { operation: "delete" })
    }
}
