//! The host filesystem backend.

use crate::error::{Error, Result};
use crate::store::PersistentState;
use crate::system::{DirEntry, Stat, StatKind, System};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use tansu_core::AbsPath;

/// A system backed by the host filesystem and an injected persistent state.
pub struct RealSystem<P> {
    persistent_state: P,
    cmd_output_cache: RefCell<HashMap<String, Vec<u8>>>,
}

impl<P: PersistentState> RealSystem<P> {
    pub fn new(persistent_state: P) -> Self {
        RealSystem {
            persistent_state,
            cmd_output_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn persistent_state(&self) -> &P {
        &self.persistent_state
    }
}

fn stat_from_metadata(metadata: &fs::Metadata) -> Stat {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        StatKind::Dir
    } else if file_type.is_symlink() {
        StatKind::Symlink
    } else if file_type.is_file() {
        StatKind::File
    } else if file_type.is_fifo() {
        StatKind::Other("fifo".to_owned())
    } else if file_type.is_socket() {
        StatKind::Other("socket".to_owned())
    } else if file_type.is_block_device() {
        StatKind::Other("block device".to_owned())
    } else if file_type.is_char_device() {
        StatKind::Other("char device".to_owned())
    } else {
        StatKind::Other("unknown".to_owned())
    };
    Stat {
        kind,
        perm: metadata.permissions().mode() & 0o7777,
    }
}

fn split_cmd(cmd: &str) -> Result<(String, Vec<String>)> {
    let mut parts = shell_words::split(cmd).map_err(|e| Error::Parse {
        name: cmd.to_owned(),
        message: e.to_string(),
    })?;
    if parts.is_empty() {
        return Err(Error::Parse {
            name: cmd.to_owned(),
            message: "empty command".to_owned(),
        });
    }
    let program = parts.remove(0);
    Ok((program, parts))
}

impl<P: PersistentState> System for RealSystem<P> {
    fn lstat(&self, path: &AbsPath) -> Result<Stat> {
        let metadata = fs::symlink_metadata(path.as_path()).map_err(|e| Error::io(path, e))?;
        Ok(stat_from_metadata(&metadata))
    }

    fn stat(&self, path: &AbsPath) -> Result<Stat> {
        let metadata = fs::metadata(path.as_path()).map_err(|e| Error::io(path, e))?;
        Ok(stat_from_metadata(&metadata))
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path.as_path()).map_err(|e| Error::io(path, e))? {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| Error::Parse {
                name: entry.path().display().to_string(),
                message: "file name is not valid UTF-8".to_owned(),
            })?;
            let metadata = entry
                .metadata()
                .map_err(|e| Error::io(&path.join_name(name), e))?;
            entries.push(DirEntry {
                name: name.to_owned(),
                stat: stat_from_metadata(&metadata),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        fs::read(path.as_path()).map_err(|e| Error::io(path, e))
    }

    fn read_link(&self, path: &AbsPath) -> Result<String> {
        let linkname = fs::read_link(path.as_path()).map_err(|e| Error::io(path, e))?;
        linkname
            .to_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::Parse {
                name: path.to_string(),
                message: "link target is not valid UTF-8".to_owned(),
            })
    }

    fn glob(&self, pattern: &str) -> Result<Vec<AbsPath>> {
        let paths = glob::glob(pattern).map_err(|e| Error::Parse {
            name: pattern.to_owned(),
            message: e.to_string(),
        })?;
        let mut matches = Vec::new();
        for path in paths {
            let path = match path {
                Ok(path) => path,
                // A match we cannot stat is skipped rather than fatal.
                Err(_) => continue,
            };
            matches.push(AbsPath::new(path)?);
        }
        matches.sort();
        Ok(matches)
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        fs::create_dir(path.as_path()).map_err(|e| Error::io(path, e))?;
        fs::set_permissions(path.as_path(), fs::Permissions::from_mode(perm))
            .map_err(|e| Error::io(path, e))
    }

    fn write_file(&self, path: &AbsPath, contents: &[u8], perm: u32) -> Result<()> {
        fs::write(path.as_path(), contents).map_err(|e| Error::io(path, e))?;
        fs::set_permissions(path.as_path(), fs::Permissions::from_mode(perm))
            .map_err(|e| Error::io(path, e))
    }

    fn write_symlink(&self, linkname: &str, path: &AbsPath) -> Result<()> {
        match fs::symlink_metadata(path.as_path()) {
            Ok(_) => fs::remove_file(path.as_path()).map_err(|e| Error::io(path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(path, e)),
        }
        std::os::unix::fs::symlink(linkname, path.as_path()).map_err(|e| Error::io(path, e))
    }

    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        fs::set_permissions(path.as_path(), fs::Permissions::from_mode(perm))
            .map_err(|e| Error::io(path, e))
    }

    fn rename(&self, old_path: &AbsPath, new_path: &AbsPath) -> Result<()> {
        fs::rename(old_path.as_path(), new_path.as_path()).map_err(|e| Error::io(old_path, e))
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        let metadata = match fs::symlink_metadata(path.as_path()) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(path, e)),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(path.as_path()).map_err(|e| Error::io(path, e))
        } else {
            fs::remove_file(path.as_path()).map_err(|e| Error::io(path, e))
        }
    }

    fn run_cmd(&self, cmd: &str, dir: &AbsPath) -> Result<()> {
        let (program, args) = split_cmd(cmd)?;
        tracing::debug!(cmd, dir = %dir, "running command");
        duct::cmd(program, args)
            .dir(dir.as_path())
            .run()
            .map_err(|e| Error::Command {
                command: cmd.to_owned(),
                source: e,
            })?;
        Ok(())
    }

    fn run_script(&self, name: &str, dir: &AbsPath, contents: &[u8]) -> Result<()> {
        let script_error = |e: std::io::Error| Error::Script {
            name: name.to_owned(),
            source: e,
        };
        let mut script = tempfile::NamedTempFile::new().map_err(script_error)?;
        script.write_all(contents).map_err(script_error)?;
        script
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o700))
            .map_err(script_error)?;
        tracing::debug!(name, dir = %dir, "running script");
        // Scripts with a shebang run directly; everything else goes through sh.
        let expression = if contents.starts_with(b"#!") {
            duct::cmd(script.path(), Vec::<String>::new())
        } else {
            duct::cmd("sh", [script.path()])
        };
        expression
            .dir(dir.as_path())
            .run()
            .map_err(script_error)?;
        Ok(())
    }

    fn idempotent_cmd_output(&self, cmd: &str) -> Result<Vec<u8>> {
        if let Some(output) = self.cmd_output_cache.borrow().get(cmd) {
            return Ok(output.clone());
        }
        let (program, args) = split_cmd(cmd)?;
        let output = duct::cmd(program, args)
            .stdout_capture()
            .run()
            .map_err(|e| Error::Command {
                command: cmd.to_owned(),
                source: e,
            })?;
        self.cmd_output_cache
            .borrow_mut()
            .insert(cmd.to_owned(), output.stdout.clone());
        Ok(output.stdout)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.persistent_state.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.persistent_state.set(bucket, key, value)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.persistent_state.delete(bucket, key)
    }
}
