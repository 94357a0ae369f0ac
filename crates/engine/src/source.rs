//! The source state.
//!
//! A source state is read from a source directory whose basenames encode
//! target metadata, composed with ignore/remove pattern sets, template data,
//! and template partials, and then applied against a destination directory.
//!
//! The walk is sequential and ascending lexicographic, which is load-bearing
//! for special-file visibility: `.chezmoidata.*` in a directory is read
//! before `.chezmoiignore` in the same directory, so its data is available
//! to the ignore template, while `.chezmoitemplates/` is read after
//! `.chezmoiignore`, so partials are not.

use crate::attr::{DirAttributes, FileAttributes, SourceFileKind};
use crate::chattr::AttributeModifiers;
use crate::content::{EncryptionTool, LazyContents, NullEncryptionTool};
use crate::entry::{DestStateEntry, TargetStateEntry};
use crate::error::{Error, Result};
use crate::include::IncludeSet;
use crate::patternset::PatternSet;
use crate::system::{StatKind, System};
use semver::Version;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tansu_core::{AbsPath, RelPath, SourceRelPath};
use tansu_template::TemplateEngine;

/// Default umask applied to written permissions.
pub const DEFAULT_UMASK: u32 = 0o22;

const DATA_NAME: &str = ".chezmoidata";
const IGNORE_NAME: &str = ".chezmoiignore";
const REMOVE_NAME: &str = ".chezmoiremove";
const TEMPLATES_DIR_NAME: &str = ".chezmoitemplates";
const VERSION_NAME: &str = ".chezmoiversion";

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A directory entry in the source state.
#[derive(Debug)]
pub struct SourceStateDir {
    source_path: AbsPath,
    attrs: DirAttributes,
    target: Rc<TargetStateEntry>,
}

impl SourceStateDir {
    pub fn attrs(&self) -> &DirAttributes {
        &self.attrs
    }
}

/// A file entry in the source state.
///
/// `raw` memoizes the read → decrypt stages; the target state entry memoizes
/// the template stage on top of them.
#[derive(Debug)]
pub struct SourceStateFile {
    source_path: AbsPath,
    attrs: FileAttributes,
    raw: LazyContents,
    target: OnceCell<Rc<TargetStateEntry>>,
}

impl SourceStateFile {
    pub fn attrs(&self) -> &FileAttributes {
        &self.attrs
    }
}

/// An entry in the source state.
#[derive(Debug)]
pub enum SourceStateEntry {
    Dir(SourceStateDir),
    File(SourceStateFile),
}

impl SourceStateEntry {
    pub fn source_path(&self) -> &AbsPath {
        match self {
            SourceStateEntry::Dir(dir) => &dir.source_path,
            SourceStateEntry::File(file) => &file.source_path,
        }
    }
}

/// Options for [`SourceState::add`].
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Mark new files as `empty_`.
    pub empty: bool,
    /// Mark new directories as `exact_`.
    pub exact: bool,
    /// Mark new files as templates.
    pub template: bool,
    /// Entry kinds to import.
    pub include: IncludeSet,
}

impl Default for AddOptions {
    fn default() -> Self {
        AddOptions {
            empty: false,
            exact: false,
            template: false,
            include: IncludeSet::all(),
        }
    }
}

/// Builder for [`SourceState`].
pub struct SourceStateBuilder<'s, S> {
    system: &'s S,
    source_path: AbsPath,
    umask: u32,
    encryption_tool: Box<dyn EncryptionTool>,
    template_data: JsonMap,
    priority_template_data: JsonMap,
    template_engine: TemplateEngine,
}

impl<'s, S: System> SourceStateBuilder<'s, S> {
    pub fn umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    pub fn encryption_tool(mut self, encryption_tool: Box<dyn EncryptionTool>) -> Self {
        self.encryption_tool = encryption_tool;
        self
    }

    /// Merges `data` into the template data.
    pub fn template_data(mut self, data: JsonMap) -> Self {
        recursive_merge(&mut self.template_data, data);
        self
    }

    /// Merges `data` into the priority template data, which keeps precedence
    /// over data files read from the source tree.
    pub fn priority_template_data(mut self, data: JsonMap) -> Self {
        recursive_merge(&mut self.priority_template_data, data);
        self
    }

    /// Uses `engine` for all template execution. Register injected template
    /// functions on it before building.
    pub fn template_engine(mut self, engine: TemplateEngine) -> Self {
        self.template_engine = engine;
        self
    }

    pub fn build(mut self) -> SourceState<'s, S> {
        let priority = self.priority_template_data.clone();
        recursive_merge(&mut self.template_data, priority);
        SourceState {
            system: self.system,
            source_path: self.source_path,
            umask: self.umask,
            encryption_tool: self.encryption_tool,
            entries: BTreeMap::new(),
            ignore: PatternSet::new(),
            remove: PatternSet::new(),
            min_version: None,
            template_data: self.template_data,
            priority_template_data: self.priority_template_data,
            template_engine: self.template_engine,
        }
    }
}

/// The parsed, in-memory description of what the destination should be.
pub struct SourceState<'s, S> {
    system: &'s S,
    source_path: AbsPath,
    umask: u32,
    encryption_tool: Box<dyn EncryptionTool>,
    entries: BTreeMap<RelPath, SourceStateEntry>,
    ignore: PatternSet,
    remove: PatternSet,
    min_version: Option<Version>,
    template_data: JsonMap,
    priority_template_data: JsonMap,
    template_engine: TemplateEngine,
}

impl<'s, S: System> SourceState<'s, S> {
    pub fn builder(system: &'s S, source_path: AbsPath) -> SourceStateBuilder<'s, S> {
        SourceStateBuilder {
            system,
            source_path,
            umask: DEFAULT_UMASK,
            encryption_tool: Box::new(NullEncryptionTool),
            template_data: JsonMap::new(),
            priority_template_data: JsonMap::new(),
            template_engine: TemplateEngine::new(),
        }
    }

    pub fn source_path(&self) -> &AbsPath {
        &self.source_path
    }

    pub fn umask(&self) -> u32 {
        self.umask
    }

    pub fn entries(&self) -> impl Iterator<Item = (&RelPath, &SourceStateEntry)> {
        self.entries.iter()
    }

    pub fn entry(&self, target_name: &RelPath) -> Option<&SourceStateEntry> {
        self.entries.get(target_name)
    }

    /// All target names, in ascending order.
    pub fn target_names(&self) -> impl Iterator<Item = &RelPath> {
        self.entries.keys()
    }

    /// Returns whether `target_name` is ignored.
    pub fn ignored(&self, target_name: &RelPath) -> bool {
        self.ignore.matches(target_name)
    }

    /// The highest version named by any `.chezmoiversion` file.
    pub fn min_version(&self) -> Option<&Version> {
        self.min_version.as_ref()
    }

    pub fn template_data(&self) -> &JsonMap {
        &self.template_data
    }

    /// Fails when the source tree requires a newer engine than the one
    /// running.
    pub fn check_min_version(&self) -> Result<()> {
        let Some(required) = &self.min_version else {
            return Ok(());
        };
        let running = Version::parse(env!("CARGO_PKG_VERSION")).map_err(|e| Error::Parse {
            name: env!("CARGO_PKG_VERSION").to_owned(),
            message: e.to_string(),
        })?;
        if *required > running {
            return Err(Error::Version {
                required: required.clone(),
                running,
            });
        }
        Ok(())
    }

    /// Reads the source state from the source directory.
    ///
    /// Errors are collected across the whole walk so duplicate targets and
    /// parse problems all surface in one pass. A missing source directory is
    /// an empty source state.
    pub fn read(&mut self) -> Result<()> {
        let stat = match self.system.lstat(&self.source_path) {
            Err(e) if e.is_not_found() => return Ok(()),
            r => r?,
        };
        if !stat.is_dir() {
            return Err(Error::NotADirectory {
                path: self.source_path.clone(),
            });
        }

        let mut candidates: BTreeMap<RelPath, Vec<SourceStateEntry>> = BTreeMap::new();
        let mut errors = Vec::new();
        self.walk_dir(
            &SourceRelPath::empty(),
            &RelPath::empty(),
            &mut candidates,
            &mut errors,
        );

        // Candidates iterate in target-name order, so duplicate errors are
        // deterministic.
        for (target_name, group) in &candidates {
            if group.len() > 1 {
                let mut source_paths: Vec<AbsPath> =
                    group.iter().map(|e| e.source_path().clone()).collect();
                source_paths.sort();
                errors.push(Error::DuplicateTarget {
                    target_name: target_name.clone(),
                    source_paths,
                });
            }
        }
        if !errors.is_empty() {
            return Err(Error::multiple(errors));
        }

        for (target_name, mut group) in candidates {
            if let Some(entry) = group.pop() {
                self.entries.insert(target_name, entry);
            }
        }
        tracing::debug!(
            source_path = %self.source_path,
            entries = self.entries.len(),
            "read source state"
        );
        Ok(())
    }

    fn walk_dir(
        &mut self,
        source_dir: &SourceRelPath,
        target_dir: &RelPath,
        candidates: &mut BTreeMap<RelPath, Vec<SourceStateEntry>>,
        errors: &mut Vec<Error>,
    ) {
        let abs_dir = self.source_path.join_source(source_dir);
        let dir_entries = match self.system.read_dir(&abs_dir) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(e);
                return;
            }
        };
        for dir_entry in dir_entries {
            let name = dir_entry.name;
            let source_rel = source_dir.join_name(&name);
            let source_abs = self.source_path.join_source(&source_rel);
            if name.starts_with(DATA_NAME) {
                if let Err(e) = self.add_template_data(&source_abs, &name) {
                    errors.push(e);
                }
            } else if name == IGNORE_NAME {
                if let Err(e) = self.add_patterns(PatternSetKind::Ignore, &source_abs, target_dir) {
                    errors.push(e);
                }
            } else if name == REMOVE_NAME {
                if let Err(e) = self.add_patterns(PatternSetKind::Remove, &source_abs, target_dir) {
                    errors.push(e);
                }
            } else if name == TEMPLATES_DIR_NAME && dir_entry.stat.is_dir() {
                self.add_templates_dir(&source_abs, "", errors);
            } else if name == VERSION_NAME {
                if let Err(e) = self.add_version_file(&source_abs) {
                    errors.push(e);
                }
            } else if name.starts_with('.') {
                // Other dotfiles in the source directory are not managed and
                // not descended into.
            } else {
                match dir_entry.stat.kind {
                    StatKind::Dir => {
                        let attrs = DirAttributes::parse(&name);
                        let target_name = target_dir.join_name(&attrs.name);
                        if self.ignore.matches(&target_name) {
                            continue;
                        }
                        let target = Rc::new(TargetStateEntry::Dir {
                            perm: attrs.perm(),
                            exact: attrs.exact,
                        });
                        candidates.entry(target_name.clone()).or_default().push(
                            SourceStateEntry::Dir(SourceStateDir {
                                source_path: source_abs,
                                attrs,
                                target,
                            }),
                        );
                        self.walk_dir(&source_rel, &target_name, candidates, errors);
                    }
                    StatKind::File => {
                        let attrs = FileAttributes::parse(&name);
                        let target_name = target_dir.join_name(&attrs.name);
                        if self.ignore.matches(&target_name) {
                            continue;
                        }
                        candidates.entry(target_name).or_default().push(
                            SourceStateEntry::File(SourceStateFile {
                                source_path: source_abs,
                                attrs,
                                raw: LazyContents::pending(),
                                target: OnceCell::new(),
                            }),
                        );
                    }
                    StatKind::Symlink => errors.push(Error::UnsupportedFileType {
                        path: source_abs,
                        file_type: "symlink".to_owned(),
                    }),
                    StatKind::Other(file_type) => errors.push(Error::UnsupportedFileType {
                        path: source_abs,
                        file_type,
                    }),
                }
            }
        }
    }

    fn add_template_data(&mut self, path: &AbsPath, name: &str) -> Result<()> {
        let format = name
            .strip_prefix(DATA_NAME)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| Error::UnknownFormat { path: path.clone() })?;
        let data = self.system.read_file(path)?;
        let parse_error = |message: String| Error::Parse {
            name: path.to_string(),
            message,
        };
        let value: serde_json::Value = match format {
            "json" => serde_json::from_slice(&data).map_err(|e| parse_error(e.to_string()))?,
            "toml" => {
                let text =
                    std::str::from_utf8(&data).map_err(|e| parse_error(e.to_string()))?;
                let table: toml::Table =
                    toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))?
            }
            "yaml" => serde_yaml::from_slice(&data).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(Error::UnknownFormat { path: path.clone() }),
        };
        let serde_json::Value::Object(map) = value else {
            return Err(parse_error("top-level value is not a mapping".to_owned()));
        };
        validate_keys(&map)?;
        recursive_merge(&mut self.template_data, map);
        recursive_merge(&mut self.template_data, self.priority_template_data.clone());
        Ok(())
    }

    fn add_patterns(
        &mut self,
        kind: PatternSetKind,
        path: &AbsPath,
        target_dir: &RelPath,
    ) -> Result<()> {
        let data = self.execute_template_file(path)?;
        let text = String::from_utf8(data).map_err(|e| Error::Parse {
            name: path.to_string(),
            message: e.to_string(),
        })?;
        let pattern_set = match kind {
            PatternSetKind::Ignore => &mut self.ignore,
            PatternSetKind::Remove => &mut self.remove,
        };
        for line in text.lines() {
            let line = match line.find('#') {
                Some(index) => &line[..index],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (pattern, include) = match line.strip_prefix('!') {
                Some(rest) => (rest, false),
                None => (line, true),
            };
            let pattern = pattern.trim_start_matches('/');
            let full_pattern = if target_dir.is_empty() {
                pattern.to_owned()
            } else {
                format!("{target_dir}/{pattern}")
            };
            pattern_set
                .add(&full_pattern, include)
                .map_err(|e| Error::Parse {
                    name: path.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn add_templates_dir(&mut self, dir: &AbsPath, prefix: &str, errors: &mut Vec<Error>) {
        let dir_entries = match self.system.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(e);
                return;
            }
        };
        for dir_entry in dir_entries {
            let path = dir.join_name(&dir_entry.name);
            let template_name = if prefix.is_empty() {
                dir_entry.name.clone()
            } else {
                format!("{prefix}/{}", dir_entry.name)
            };
            match dir_entry.stat.kind {
                StatKind::File => {
                    let result = self.system.read_file(&path).and_then(|contents| {
                        let text = std::str::from_utf8(&contents).map_err(|e| Error::Parse {
                            name: path.to_string(),
                            message: e.to_string(),
                        })?;
                        self.template_engine
                            .add_partial(&template_name, text)
                            .map_err(Error::from)
                    });
                    if let Err(e) = result {
                        errors.push(e);
                    }
                }
                StatKind::Dir => self.add_templates_dir(&path, &template_name, errors),
                StatKind::Symlink => errors.push(Error::UnsupportedFileType {
                    path,
                    file_type: "symlink".to_owned(),
                }),
                StatKind::Other(file_type) => {
                    errors.push(Error::UnsupportedFileType { path, file_type });
                }
            }
        }
    }

    fn add_version_file(&mut self, path: &AbsPath) -> Result<()> {
        let data = self.system.read_file(path)?;
        let text = std::str::from_utf8(&data).map_err(|e| Error::Parse {
            name: path.to_string(),
            message: e.to_string(),
        })?;
        let version = Version::parse(text.trim()).map_err(|e| Error::Parse {
            name: path.to_string(),
            message: e.to_string(),
        })?;
        if self.min_version.as_ref().is_none_or(|min| version > *min) {
            self.min_version = Some(version);
        }
        Ok(())
    }

    /// Executes template `data` with the current template data and partials.
    pub fn execute_template_data(&self, name: &str, data: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(data).map_err(|e| Error::Parse {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        let context = serde_json::Value::Object(self.template_data.clone());
        let output = self.template_engine.render(name, text, &context)?;
        Ok(output.into_bytes())
    }

    fn execute_template_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        let data = self.system.read_file(path)?;
        self.execute_template_data(&path.to_string(), &data)
    }

    fn raw_contents<'a>(&'a self, file: &'a SourceStateFile) -> Result<&'a [u8]> {
        file.raw.get_or_try_init(|| {
            let contents = self.system.read_file(&file.source_path)?;
            if file.attrs.encrypted {
                self.encryption_tool.decrypt(&file.source_path, &contents)
            } else {
                Ok(contents)
            }
        })
    }

    /// The target state entry for `target_name`, constructed on first use.
    ///
    /// For file entries this forces the read → decrypt → template pipeline;
    /// the result is memoized per entry.
    pub fn target_state_entry(&self, target_name: &RelPath) -> Result<Rc<TargetStateEntry>> {
        let entry = self
            .entries
            .get(target_name)
            .ok_or_else(|| Error::EntryNotFound {
                target_name: target_name.clone(),
            })?;
        match entry {
            SourceStateEntry::Dir(dir) => Ok(Rc::clone(&dir.target)),
            SourceStateEntry::File(file) => {
                if let Some(target) = file.target.get() {
                    return Ok(Rc::clone(target));
                }
                let target = Rc::new(self.build_file_target(file, target_name)?);
                let _ = file.target.set(Rc::clone(&target));
                Ok(target)
            }
        }
    }

    fn build_file_target(
        &self,
        file: &SourceStateFile,
        target_name: &RelPath,
    ) -> Result<TargetStateEntry> {
        let raw = self.raw_contents(file)?;
        let contents = if file.attrs.template {
            self.execute_template_data(&file.source_path.to_string(), raw)?
        } else {
            raw.to_vec()
        };
        match file.attrs.kind {
            SourceFileKind::File => {
                if !file.attrs.empty && contents.is_empty() {
                    Ok(TargetStateEntry::Absent)
                } else {
                    Ok(TargetStateEntry::File {
                        perm: file.attrs.perm(),
                        contents: LazyContents::new(contents),
                    })
                }
            }
            SourceFileKind::Present => Ok(TargetStateEntry::Present {
                perm: file.attrs.perm(),
                contents: LazyContents::new(contents),
            }),
            SourceFileKind::Script => Ok(TargetStateEntry::Script {
                name: target_name.clone(),
                once: file.attrs.once,
                contents: LazyContents::new(contents),
            }),
            SourceFileKind::Symlink => {
                let linkname = String::from_utf8(contents).map_err(|e| Error::Parse {
                    name: file.source_path.to_string(),
                    message: e.to_string(),
                })?;
                Ok(TargetStateEntry::Symlink {
                    linkname: linkname.trim().to_owned(),
                })
            }
        }
    }

    /// Forces every entry's contents, hashes, decryptions, and template
    /// expansions, so errors surface before any mutation.
    pub fn evaluate(&self) -> Result<()> {
        for (target_name, entry) in &self.entries {
            if let SourceStateEntry::File(file) = entry {
                self.raw_contents(file)?;
                file.raw.sha256()?;
            }
            let target = self.target_state_entry(target_name)?;
            target.evaluate()?;
        }
        Ok(())
    }

    /// Applies every entry to `target_dir`, ascending by target name, so
    /// parents are applied before their children.
    pub fn apply_all<T: System>(
        &self,
        target_system: &T,
        target_dir: &AbsPath,
        include: IncludeSet,
        umask: u32,
    ) -> Result<()> {
        for target_name in self.entries.keys() {
            self.apply_one(target_system, target_dir, target_name, include, umask)?;
        }
        Ok(())
    }

    /// Applies a single entry to `target_dir`.
    pub fn apply_one<T: System>(
        &self,
        target_system: &T,
        target_dir: &AbsPath,
        target_name: &RelPath,
        include: IncludeSet,
        umask: u32,
    ) -> Result<()> {
        let target_state_entry = self.target_state_entry(target_name)?;
        if !include.includes_target(&target_state_entry) {
            return Ok(());
        }
        let target_path = target_dir.join(target_name);
        let dest_state_entry = DestStateEntry::read(target_system, &target_path)?;
        tracing::trace!(target = %target_name, "applying entry");
        target_state_entry.apply(target_system, target_dir, target_name, &dest_state_entry, umask)?;

        // An exact directory keeps only the children the source state names.
        if let TargetStateEntry::Dir { exact: true, .. } = &*target_state_entry {
            for dir_entry in target_system.read_dir(&target_path)? {
                let child_name = target_name.join_name(&dir_entry.name);
                if !self.entries.contains_key(&child_name) {
                    tracing::debug!(child = %child_name, "removing extra entry in exact directory");
                    target_system.remove_all(&target_path.join_name(&dir_entry.name))?;
                }
            }
        }
        Ok(())
    }

    /// Removes destination paths matching the remove pattern set.
    ///
    /// Paths that are targets of managed entries are never removed.
    pub fn remove<T: System>(&self, target_system: &T, target_dir: &AbsPath) -> Result<()> {
        let mut target_paths_to_remove = Vec::new();
        for pattern in self.remove.include_patterns() {
            let full_pattern = format!("{target_dir}/{pattern}");
            for matched in target_system.glob(&full_pattern)? {
                let rel = matched.strip_prefix(target_dir)?;
                // Excludes inside the remove set take effect here.
                if !self.remove.matches(&rel) {
                    continue;
                }
                if self.entries.contains_key(&rel) {
                    continue;
                }
                target_paths_to_remove.push(matched);
            }
        }
        target_paths_to_remove.sort();
        target_paths_to_remove.dedup();
        // Parents sort before children; RemoveAll treats not-found as
        // success, so the order is harmless.
        for target_path in target_paths_to_remove {
            tracing::debug!(path = %target_path, "removing");
            target_system.remove_all(&target_path)?;
        }
        Ok(())
    }

    /// Imports destination paths into the source directory.
    ///
    /// The source path of each new entry is the concatenation of its
    /// ancestors' encoded basenames (reusing the encoded names of ancestors
    /// already managed) with the leaf basename encoded from the destination
    /// entry and `options`.
    pub fn add<T: System, U: System>(
        &self,
        source_system: &T,
        dest_system: &U,
        dest_dir: &AbsPath,
        dest_paths: &[AbsPath],
        options: &AddOptions,
    ) -> Result<()> {
        let mut dest_paths: Vec<&AbsPath> = dest_paths.iter().collect();
        dest_paths.sort();
        for dest_path in dest_paths {
            let rel = dest_path.strip_prefix(dest_dir)?;
            let dest_state_entry = DestStateEntry::read(dest_system, dest_path)?;
            if !options.include.includes_dest(&dest_state_entry) {
                continue;
            }

            let mut source_dir_abs = self.source_path.clone();
            let mut target_prefix = RelPath::empty();
            if let Some(parent) = rel.parent() {
                for component in parent.as_path().components() {
                    let component = component.as_os_str().to_str().ok_or_else(|| Error::Parse {
                        name: dest_path.to_string(),
                        message: "path is not valid UTF-8".to_owned(),
                    })?;
                    target_prefix = target_prefix.join_name(component);
                    let encoded = match self.entries.get(&target_prefix) {
                        Some(entry) => entry
                            .source_path()
                            .file_name()
                            .map(ToOwned::to_owned)
                            .ok_or_else(|| Error::Parse {
                                name: entry.source_path().to_string(),
                                message: "source path has no file name".to_owned(),
                            })?,
                        None => {
                            let stat = dest_system.lstat(&dest_dir.join(&target_prefix))?;
                            DirAttributes {
                                name: component.to_owned(),
                                exact: false,
                                private: stat.perm & 0o77 == 0,
                            }
                            .source_name()
                        }
                    };
                    source_dir_abs = source_dir_abs.join_name(&encoded);
                    mkdir_if_missing(source_system, &source_dir_abs, 0o777 & !self.umask)?;
                }
            }

            let leaf = rel.file_name().ok_or_else(|| Error::Parse {
                name: dest_path.to_string(),
                message: "path has no file name".to_owned(),
            })?;
            match &dest_state_entry {
                DestStateEntry::Absent { .. } => {
                    return Err(Error::NotFound {
                        path: dest_path.clone(),
                    });
                }
                DestStateEntry::Dir { perm, .. } => {
                    let attrs = DirAttributes {
                        name: leaf.to_owned(),
                        exact: options.exact,
                        private: perm & 0o77 == 0,
                    };
                    mkdir_if_missing(
                        source_system,
                        &source_dir_abs.join_name(&attrs.source_name()),
                        0o777 & !self.umask,
                    )?;
                }
                DestStateEntry::File { perm, contents, .. } => {
                    let attrs = FileAttributes {
                        name: leaf.to_owned(),
                        kind: SourceFileKind::File,
                        empty: options.empty,
                        encrypted: false,
                        executable: perm & 0o111 != 0,
                        private: perm & 0o77 == 0,
                        template: options.template,
                        once: false,
                    };
                    source_system.write_file(
                        &source_dir_abs.join_name(&attrs.source_name()),
                        contents.bytes()?,
                        0o666 & !self.umask,
                    )?;
                }
                DestStateEntry::Symlink { linkname, .. } => {
                    let attrs = FileAttributes {
                        name: leaf.to_owned(),
                        kind: SourceFileKind::Symlink,
                        empty: false,
                        encrypted: false,
                        executable: false,
                        private: false,
                        template: options.template,
                        once: false,
                    };
                    source_system.write_file(
                        &source_dir_abs.join_name(&attrs.source_name()),
                        linkname.as_bytes(),
                        0o666 & !self.umask,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Renames source entries to change their encoded attributes.
    ///
    /// Targets are processed in descending order so children are renamed
    /// before their parents.
    pub fn chattr<T: System>(
        &self,
        source_system: &T,
        modifiers: &AttributeModifiers,
        target_names: &[RelPath],
    ) -> Result<()> {
        let mut target_names: Vec<&RelPath> = target_names.iter().collect();
        target_names.sort();
        for target_name in target_names.into_iter().rev() {
            let entry = self
                .entries
                .get(target_name)
                .ok_or_else(|| Error::EntryNotFound {
                    target_name: target_name.clone(),
                })?;
            let (source_path, new_basename) = match entry {
                SourceStateEntry::Dir(dir) => {
                    (&dir.source_path, modifiers.apply_dir(&dir.attrs).source_name())
                }
                SourceStateEntry::File(file) => (
                    &file.source_path,
                    modifiers.apply_file(&file.attrs)?.source_name(),
                ),
            };
            let old_basename = source_path.file_name().ok_or_else(|| Error::Parse {
                name: source_path.to_string(),
                message: "source path has no file name".to_owned(),
            })?;
            if new_basename != old_basename {
                let new_path = source_path
                    .parent()
                    .ok_or_else(|| Error::Parse {
                        name: source_path.to_string(),
                        message: "source path has no parent".to_owned(),
                    })?
                    .join_name(&new_basename);
                tracing::debug!(from = %source_path, to = %new_path, "renaming source entry");
                source_system.rename(source_path, &new_path)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PatternSetKind {
    Ignore,
    Remove,
}

fn mkdir_if_missing<S: System>(system: &S, path: &AbsPath, perm: u32) -> Result<()> {
    match system.mkdir(path, perm) {
        Err(Error::Exists { .. }) => Ok(()),
        result => result,
    }
}

/// Deep-merges `src` into `dest`: nested mappings merge recursively, scalars
/// and sequences from `src` replace existing values.
fn recursive_merge(dest: &mut JsonMap, src: JsonMap) {
    for (key, value) in src {
        if let serde_json::Value::Object(incoming) = value {
            if let Some(serde_json::Value::Object(existing)) = dest.get_mut(&key) {
                recursive_merge(existing, incoming);
            } else {
                dest.insert(key, serde_json::Value::Object(incoming));
            }
        } else {
            dest.insert(key, value);
        }
    }
}

/// Template data keys must be identifiers so they are addressable from
/// templates.
fn validate_keys(map: &JsonMap) -> Result<()> {
    for (key, value) in map {
        if !is_valid_key(key) {
            return Err(Error::InvalidKey { key: key.clone() });
        }
        if let serde_json::Value::Object(nested) = value {
            validate_keys(nested)?;
        }
    }
    Ok(())
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
