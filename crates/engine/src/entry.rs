//! Target and destination state entries.
//!
//! A [`TargetStateEntry`] describes what a single path should be; a
//! [`DestStateEntry`] describes what it currently is, observed by lstat.
//! `apply` performs the minimal mutations to make the destination match and
//! `equal` is its fixed-point check: after a successful apply, `equal` holds.

use crate::content::{LazyContents, digests_equal, sha256_digest};
use crate::error::{Error, Result};
use crate::store::SCRIPT_STATE_BUCKET;
use crate::system::{StatKind, System};
use tansu_core::{AbsPath, RelPath};

/// The desired state of a single target path.
#[derive(Debug)]
pub enum TargetStateEntry {
    /// Nothing should exist at the path.
    Absent,
    Dir {
        perm: u32,
        /// Destination children not present in the source state are removed.
        exact: bool,
    },
    File {
        perm: u32,
        contents: LazyContents,
    },
    /// A file that must exist; contents are written only on creation.
    Present {
        perm: u32,
        contents: LazyContents,
    },
    /// A script to run; leaves no on-disk form in the destination.
    Script {
        name: RelPath,
        once: bool,
        contents: LazyContents,
    },
    Symlink {
        linkname: String,
    },
}

impl TargetStateEntry {
    /// Forces lazy contents and their hashes so errors surface early.
    pub fn evaluate(&self) -> Result<()> {
        match self {
            TargetStateEntry::File { contents, .. }
            | TargetStateEntry::Present { contents, .. }
            | TargetStateEntry::Script { contents, .. } => {
                contents.sha256()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Mutates the destination through `system` so that `target_name` under
    /// `target_dir` matches this entry. `dest` is the current state at the
    /// same path.
    pub fn apply<S: System>(
        &self,
        system: &S,
        target_dir: &AbsPath,
        target_name: &RelPath,
        dest: &DestStateEntry,
        umask: u32,
    ) -> Result<()> {
        let target_path = target_dir.join(target_name);
        match self {
            TargetStateEntry::Absent => match dest {
                DestStateEntry::Absent { .. } => Ok(()),
                _ => system.remove_all(&target_path),
            },
            TargetStateEntry::Dir { perm, .. } => {
                let perm = perm & !umask;
                match dest {
                    DestStateEntry::Dir {
                        perm: dest_perm, ..
                    } => {
                        if *dest_perm != perm {
                            system.chmod(&target_path, perm)?;
                        }
                        Ok(())
                    }
                    DestStateEntry::Absent { .. } => system.mkdir(&target_path, perm),
                    _ => {
                        system.remove_all(&target_path)?;
                        system.mkdir(&target_path, perm)
                    }
                }
            }
            TargetStateEntry::File { perm, contents } => {
                let perm = perm & !umask;
                let contents = contents.bytes()?;
                match dest {
                    DestStateEntry::File {
                        perm: dest_perm,
                        contents: dest_contents,
                        ..
                    } => {
                        if !digests_equal(&sha256_digest(contents), dest_contents.sha256()?) {
                            system.write_file(&target_path, contents, perm)?;
                        } else if *dest_perm != perm {
                            system.chmod(&target_path, perm)?;
                        }
                        Ok(())
                    }
                    DestStateEntry::Absent { .. } => {
                        system.write_file(&target_path, contents, perm)
                    }
                    _ => {
                        system.remove_all(&target_path)?;
                        system.write_file(&target_path, contents, perm)
                    }
                }
            }
            TargetStateEntry::Present { perm, contents } => {
                let perm = perm & !umask;
                match dest {
                    // The file exists: contents stay untouched.
                    DestStateEntry::File {
                        perm: dest_perm, ..
                    } => {
                        if *dest_perm != perm {
                            system.chmod(&target_path, perm)?;
                        }
                        Ok(())
                    }
                    DestStateEntry::Absent { .. } => {
                        system.write_file(&target_path, contents.bytes()?, perm)
                    }
                    _ => {
                        system.remove_all(&target_path)?;
                        system.write_file(&target_path, contents.bytes()?, perm)
                    }
                }
            }
            TargetStateEntry::Script {
                name,
                once,
                contents,
            } => {
                let contents = contents.bytes()?;
                let script_name = name.to_string();
                if *once {
                    let key = sha256_digest(contents);
                    if system.get(SCRIPT_STATE_BUCKET, &key)?.is_some() {
                        tracing::debug!(name = %script_name, "skipping already-run script");
                        return Ok(());
                    }
                    system.run_script(&script_name, target_dir, contents)?;
                    system.set(SCRIPT_STATE_BUCKET, &key, script_name.as_bytes())
                } else {
                    system.run_script(&script_name, target_dir, contents)
                }
            }
            TargetStateEntry::Symlink { linkname } => match dest {
                DestStateEntry::Symlink {
                    linkname: dest_linkname,
                    ..
                } => {
                    if dest_linkname != linkname {
                        system.write_symlink(linkname, &target_path)?;
                    }
                    Ok(())
                }
                DestStateEntry::Absent { .. } => system.write_symlink(linkname, &target_path),
                _ => {
                    system.remove_all(&target_path)?;
                    system.write_symlink(linkname, &target_path)
                }
            },
        }
    }

    /// Returns whether the destination already matches this entry.
    pub fn equal(&self, dest: &DestStateEntry, umask: u32) -> Result<bool> {
        match (self, dest) {
            (TargetStateEntry::Absent, DestStateEntry::Absent { .. }) => Ok(true),
            (TargetStateEntry::Dir { perm, .. }, DestStateEntry::Dir { perm: dest_perm, .. }) => {
                Ok(*dest_perm == perm & !umask)
            }
            (
                TargetStateEntry::File { perm, contents },
                DestStateEntry::File {
                    perm: dest_perm,
                    contents: dest_contents,
                    ..
                },
            ) => Ok(*dest_perm == perm & !umask
                && digests_equal(contents.sha256()?, dest_contents.sha256()?)),
            (
                TargetStateEntry::Present { perm, .. },
                DestStateEntry::File { perm: dest_perm, .. },
            ) => Ok(*dest_perm == perm & !umask),
            (
                TargetStateEntry::Symlink { linkname },
                DestStateEntry::Symlink {
                    linkname: dest_linkname,
                    ..
                },
            ) => Ok(linkname == dest_linkname),
            // Scripts have no persistent destination form.
            (TargetStateEntry::Script { .. }, _) => Ok(true),
            _ => Ok(false),
        }
    }
}

/// The observed state of a single destination path.
#[derive(Debug)]
pub enum DestStateEntry {
    Absent {
        path: AbsPath,
    },
    Dir {
        path: AbsPath,
        perm: u32,
    },
    File {
        path: AbsPath,
        perm: u32,
        contents: LazyContents,
    },
    Symlink {
        path: AbsPath,
        linkname: String,
    },
}

impl DestStateEntry {
    /// Reads the destination state at `path` by lstat-ing it.
    pub fn read<S: System>(system: &S, path: &AbsPath) -> Result<Self> {
        let stat = match system.lstat(path) {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => {
                return Ok(DestStateEntry::Absent { path: path.clone() });
            }
            Err(e) => return Err(e),
        };
        match stat.kind {
            StatKind::Dir => Ok(DestStateEntry::Dir {
                path: path.clone(),
                perm: stat.perm,
            }),
            StatKind::File => {
                let contents = system.read_file(path)?;
                Ok(DestStateEntry::File {
                    path: path.clone(),
                    perm: stat.perm,
                    contents: LazyContents::new(contents),
                })
            }
            StatKind::Symlink => Ok(DestStateEntry::Symlink {
                path: path.clone(),
                linkname: system.read_link(path)?,
            }),
            StatKind::Other(file_type) => Err(Error::UnsupportedFileType {
                path: path.clone(),
                file_type,
            }),
        }
    }

    pub fn path(&self) -> &AbsPath {
        match self {
            DestStateEntry::Absent { path }
            | DestStateEntry::Dir { path, .. }
            | DestStateEntry::File { path, .. }
            | DestStateEntry::Symlink { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn abs(path: &str) -> AbsPath {
        AbsPath::new(path.into()).unwrap()
    }

    #[test]
    fn equal_absent() {
        let target = TargetStateEntry::Absent;
        let dest = DestStateEntry::Absent {
            path: abs("/home/user/foo"),
        };
        assert!(target.equal(&dest, 0o22).unwrap());
    }

    #[test]
    fn equal_file_compares_contents_and_effective_perm() {
        let target = TargetStateEntry::File {
            perm: 0o666,
            contents: LazyContents::new(b"bar".to_vec()),
        };
        let dest = DestStateEntry::File {
            path: abs("/home/user/foo"),
            perm: 0o644,
            contents: LazyContents::new(b"bar".to_vec()),
        };
        assert!(target.equal(&dest, 0o22).unwrap());

        let dest_other = DestStateEntry::File {
            path: abs("/home/user/foo"),
            perm: 0o644,
            contents: LazyContents::new(b"baz".to_vec()),
        };
        assert!(!target.equal(&dest_other, 0o22).unwrap());
    }

    #[test]
    fn equal_present_ignores_contents() {
        let target = TargetStateEntry::Present {
            perm: 0o666,
            contents: LazyContents::new(b"bar".to_vec()),
        };
        let dest = DestStateEntry::File {
            path: abs("/home/user/foo"),
            perm: 0o644,
            contents: LazyContents::new(b"completely different".to_vec()),
        };
        assert!(target.equal(&dest, 0o22).unwrap());
    }

    #[test]
    fn equal_symlink_compares_linkname() {
        let target = TargetStateEntry::Symlink {
            linkname: "bar".to_owned(),
        };
        let dest = DestStateEntry::Symlink {
            path: abs("/home/user/foo"),
            linkname: "bar".to_owned(),
        };
        assert!(target.equal(&dest, 0o22).unwrap());
        let dest_other = DestStateEntry::Symlink {
            path: abs("/home/user/foo"),
            linkname: "qux".to_owned(),
        };
        assert!(!target.equal(&dest_other, 0o22).unwrap());
    }

    #[test]
    fn equal_script_always_holds() {
        let target = TargetStateEntry::Script {
            name: RelPath::new("setup".into()).unwrap(),
            once: false,
            contents: LazyContents::new(b"echo hi".to_vec()),
        };
        let dest = DestStateEntry::Absent {
            path: abs("/home/user/setup"),
        };
        assert!(target.equal(&dest, 0o22).unwrap());
    }

    #[test]
    fn equal_kind_mismatch_is_false() {
        let target = TargetStateEntry::Dir {
            perm: 0o777,
            exact: false,
        };
        let dest = DestStateEntry::File {
            path: abs("/home/user/foo"),
            perm: 0o755,
            contents: LazyContents::new(Vec::new()),
        };
        assert!(!target.equal(&dest, 0o22).unwrap());
    }
}
