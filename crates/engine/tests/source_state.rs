//! End-to-end source state tests over a real temporary directory.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tansu_engine::{
    AbsPath, AddOptions, AttributeModifiers, DestStateEntry, DryRunSystem, DumpEntry, DumpSystem,
    IncludeSet, MockPersistentState, Operation, ReadOnlySystem, RealSystem, RelPath, SourceState,
};
use tempfile::TempDir;

const UMASK: u32 = 0o22;

struct TestFs {
    _temp: TempDir,
    home: AbsPath,
    source: AbsPath,
}

impl TestFs {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let home = AbsPath::from_path(temp.path()).unwrap();
        let source = temp.path().join(".local/share/chezmoi");
        fs::create_dir_all(&source).unwrap();
        TestFs {
            home,
            source: AbsPath::new(source).unwrap(),
            _temp: temp,
        }
    }

    fn write_source(&self, rel: &str, contents: &str) {
        let path = self.source.as_path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn mkdir_source(&self, rel: &str) {
        fs::create_dir_all(self.source.as_path().join(rel)).unwrap();
    }

    fn write_home(&self, rel: &str, contents: &str) {
        let path = self.home.as_path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn home_path(&self, rel: &str) -> std::path::PathBuf {
        self.home.as_path().join(rel)
    }
}

fn rel(name: &str) -> RelPath {
    RelPath::new(name.into()).unwrap()
}

fn assert_mode(path: &Path, mode: u32) {
    let perm = fs::metadata(path).unwrap().permissions().mode() & 0o7777;
    assert_eq!(perm, mode, "{}", path.display());
}

fn json_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[test]
fn apply_translates_dot_prefix() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state.evaluate().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    let profile = test_fs.home_path(".profile");
    assert_eq!(fs::read_to_string(&profile).unwrap(), "hello");
    assert_mode(&profile, 0o644);
}

#[test]
fn apply_renders_templates() {
    let test_fs = TestFs::new();
    test_fs.write_source("foo.tmpl", "email = {{ email }}");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone())
        .template_data(json_map(serde_json::json!({"email": "you@example.com"})))
        .build();
    state.read().unwrap();
    state.evaluate().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(
        fs::read_to_string(test_fs.home_path("foo")).unwrap(),
        "email = you@example.com"
    );
}

#[test]
fn empty_contents_remove_the_target() {
    let test_fs = TestFs::new();
    test_fs.write_source("foo", "");
    test_fs.write_home("foo", "stale");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert!(!test_fs.home_path("foo").exists());
}

#[test]
fn empty_attribute_keeps_the_target() {
    let test_fs = TestFs::new();
    test_fs.write_source("empty_foo", "");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    let foo = test_fs.home_path("foo");
    assert_eq!(fs::read_to_string(&foo).unwrap(), "");
    assert_mode(&foo, 0o644);
}

#[test]
fn exact_dir_removes_unmanaged_children() {
    let test_fs = TestFs::new();
    test_fs.write_home("foo/bar", "extra");
    test_fs.mkdir_source("exact_foo");
    test_fs.write_source("exact_foo/keep", "managed");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert!(test_fs.home_path("foo").is_dir());
    assert_mode(&test_fs.home_path("foo"), 0o755);
    assert!(!test_fs.home_path("foo/bar").exists());
    assert_eq!(
        fs::read_to_string(test_fs.home_path("foo/keep")).unwrap(),
        "managed"
    );
}

#[test]
fn exists_file_keeps_existing_contents() {
    let test_fs = TestFs::new();
    test_fs.write_source("exists_foo", "bar");
    test_fs.write_home("foo", "baz");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(fs::read_to_string(test_fs.home_path("foo")).unwrap(), "baz");
    assert_mode(&test_fs.home_path("foo"), 0o644);
}

#[test]
fn exists_file_writes_contents_on_creation() {
    let test_fs = TestFs::new();
    test_fs.write_source("exists_foo", "bar");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(fs::read_to_string(test_fs.home_path("foo")).unwrap(), "bar");
}

#[test]
fn symlink_target_is_templated() {
    let test_fs = TestFs::new();
    test_fs.write_source("symlink_foo.tmpl", "bar_{{ os }}");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone())
        .template_data(json_map(serde_json::json!({"os": "linux"})))
        .build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    let foo = test_fs.home_path("foo");
    assert!(fs::symlink_metadata(&foo).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&foo).unwrap(), Path::new("bar_linux"));
}

#[test]
fn duplicate_targets_are_a_read_error() {
    let test_fs = TestFs::new();
    test_fs.write_source("foo", "bar");
    test_fs.write_source("foo.tmpl", "bar");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    let err = state.read().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "foo: duplicate target ({src}/foo, {src}/foo.tmpl)",
            src = test_fs.source
        )
    );
}

#[test]
fn version_files_raise_the_minimum_version() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoiversion", "2.3.4\n");
    test_fs.write_source("foo/.chezmoiversion", "1.2.3\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    assert_eq!(
        state.min_version(),
        Some(&semver::Version::new(2, 3, 4))
    );
    // The engine is older than 2.3.4, so the source tree is rejected.
    assert!(state.check_min_version().is_err());
}

#[test]
fn apply_is_idempotent() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    test_fs.mkdir_source("exact_dot_config");
    test_fs.write_source("exact_dot_config/app.conf", "conf");
    test_fs.write_source("symlink_link", "dot_profile_target");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state.evaluate().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    // The second apply performs no mutating calls and every target equals
    // its destination.
    let dry_run = DryRunSystem::new(&system);
    state
        .apply_all(&dry_run, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();
    assert_eq!(dry_run.operations(), Vec::new());

    for target_name in state.target_names() {
        let target = state.target_state_entry(target_name).unwrap();
        let dest = DestStateEntry::read(&system, &test_fs.home.join(target_name)).unwrap();
        assert!(
            target.equal(&dest, UMASK).unwrap(),
            "{target_name} should equal its destination"
        );
    }
}

#[test]
fn changed_permissions_only_chmod() {
    let test_fs = TestFs::new();
    test_fs.write_source("foo", "bar");
    test_fs.write_home("foo", "bar");
    fs::set_permissions(
        test_fs.home_path("foo"),
        fs::Permissions::from_mode(0o600),
    )
    .unwrap();
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let dry_run = DryRunSystem::new(&system);
    state
        .apply_all(&dry_run, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();
    assert_eq!(
        dry_run.operations(),
        vec![Operation::Chmod {
            path: test_fs.home.join(&rel("foo")),
            perm: 0o644,
        }]
    );
}

#[test]
fn template_data_files_feed_the_ignore_template() {
    let test_fs = TestFs::new();
    // .chezmoidata.* sorts before .chezmoiignore, so its data is visible to
    // the ignore template.
    test_fs.write_source(".chezmoidata.toml", "docs_dir = \"docs\"\n");
    test_fs.write_source(".chezmoiignore", "{{ docs_dir }}\n# a comment\n");
    test_fs.mkdir_source("docs");
    test_fs.write_source("docs/readme", "ignored");
    test_fs.write_source("dot_profile", "kept");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    assert!(state.ignored(&rel("docs")));
    assert!(state.entry(&rel("docs")).is_none());
    assert!(state.entry(&rel("docs/readme")).is_none());
    assert!(state.entry(&rel(".profile")).is_some());

    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();
    assert!(!test_fs.home_path("docs").exists());
}

#[test]
fn partials_are_not_available_to_the_ignore_template() {
    let test_fs = TestFs::new();
    // .chezmoitemplates sorts after .chezmoiignore; this asymmetry is
    // deliberate.
    test_fs.write_source(".chezmoitemplates/head", "docs");
    test_fs.write_source(".chezmoiignore", "{% include \"head\" %}\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    assert!(state.read().is_err());
}

#[test]
fn partials_are_available_to_source_file_templates() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoitemplates/greeting", "hello {{ name }}");
    test_fs.write_source(".chezmoitemplates/sub/sig", "-- {{ name }}");
    test_fs.write_source(
        "dot_signature.tmpl",
        "{% include \"greeting\" %} {% include \"sub/sig\" %}",
    );
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone())
        .template_data(json_map(serde_json::json!({"name": "ada"})))
        .build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(
        fs::read_to_string(test_fs.home_path(".signature")).unwrap(),
        "hello ada -- ada"
    );
}

#[test]
fn priority_template_data_wins_over_data_files() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoidata.json", r#"{"email": "file@example.com"}"#);
    test_fs.write_source("foo.tmpl", "{{ email }}");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone())
        .priority_template_data(json_map(
            serde_json::json!({"email": "priority@example.com"}),
        ))
        .build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(
        fs::read_to_string(test_fs.home_path("foo")).unwrap(),
        "priority@example.com"
    );
}

#[test]
fn invalid_template_data_keys_are_rejected() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoidata.json", r#"{"not-an-identifier": 1}"#);
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    let err = state.read().unwrap_err();
    assert!(err.to_string().contains("invalid template data key"));
}

#[test]
fn unknown_data_format_is_rejected() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoidata.ini", "[section]\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    let err = state.read().unwrap_err();
    assert!(err.to_string().contains("unknown format"));
}

#[test]
fn once_scripts_run_at_most_once() {
    let test_fs = TestFs::new();
    test_fs.write_source("run_once_setup", "echo ran >> marker\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    // The script ran in the target directory, exactly once.
    assert_eq!(
        fs::read_to_string(test_fs.home_path("marker")).unwrap(),
        "ran\n"
    );
}

#[test]
fn scripts_without_once_run_every_apply() {
    let test_fs = TestFs::new();
    test_fs.write_source("run_setup", "#!/bin/sh\necho ran >> marker\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_eq!(
        fs::read_to_string(test_fs.home_path("marker")).unwrap(),
        "ran\nran\n"
    );
}

#[test]
fn remove_respects_excludes_and_managed_targets() {
    let test_fs = TestFs::new();
    test_fs.write_source(".chezmoiremove", "*.bak\n!keep.bak\n");
    test_fs.write_source("managed.bak", "managed");
    test_fs.write_home("stale.bak", "");
    test_fs.write_home("keep.bak", "");
    test_fs.write_home("managed.bak", "managed");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state.remove(&system, &test_fs.home).unwrap();

    assert!(!test_fs.home_path("stale.bak").exists());
    assert!(test_fs.home_path("keep.bak").exists());
    assert!(test_fs.home_path("managed.bak").exists());
}

#[test]
fn chattr_renames_source_entries() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let modifiers = AttributeModifiers::parse("+x,private").unwrap();
    state
        .chattr(&system, &modifiers, &[rel(".profile")])
        .unwrap();

    assert!(!test_fs.source.as_path().join("dot_profile").exists());
    assert!(
        test_fs
            .source
            .as_path()
            .join("private_executable_dot_profile")
            .exists()
    );
}

#[test]
fn chattr_encrypted_flip_is_unsupported() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let modifiers = AttributeModifiers::parse("encrypted").unwrap();
    assert!(
        state
            .chattr(&system, &modifiers, &[rel(".profile")])
            .is_err()
    );
    assert!(test_fs.source.as_path().join("dot_profile").exists());
}

#[test]
fn add_encodes_destination_paths_into_the_source() {
    let test_fs = TestFs::new();
    test_fs.write_home(".gitconfig", "[user]\n");
    test_fs.write_home(".config/app/conf", "key = value\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let dest_paths = [
        test_fs.home.join(&rel(".gitconfig")),
        test_fs.home.join(&rel(".config/app/conf")),
    ];
    state
        .add(
            &system,
            &system,
            &test_fs.home,
            &dest_paths,
            &AddOptions::default(),
        )
        .unwrap();

    let source = test_fs.source.as_path();
    assert_eq!(
        fs::read_to_string(source.join("dot_gitconfig")).unwrap(),
        "[user]\n"
    );
    assert_eq!(
        fs::read_to_string(source.join("dot_config/app/conf")).unwrap(),
        "key = value\n"
    );
}

#[test]
fn dump_collects_typed_records() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    test_fs.mkdir_source("dot_config");
    test_fs.write_source("symlink_link", "target");
    test_fs.write_source("run_setup", "echo hi\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let dump = DumpSystem::new();
    state
        .apply_all(&dump, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    let data = dump.data();
    let profile = test_fs.home.join(&rel(".profile")).to_string();
    assert_eq!(
        data[&profile],
        DumpEntry::File {
            name: profile.clone(),
            perm: 0o644,
            contents: "hello".to_owned(),
        }
    );
    let config = test_fs.home.join(&rel(".config")).to_string();
    assert_eq!(
        data[&config],
        DumpEntry::Dir {
            name: config.clone(),
            perm: 0o755,
        }
    );
    let link = test_fs.home.join(&rel("link")).to_string();
    assert_eq!(
        data[&link],
        DumpEntry::Symlink {
            name: link.clone(),
            linkname: "target".to_owned(),
        }
    );
    assert_eq!(
        data["setup"],
        DumpEntry::Script {
            name: "setup".to_owned(),
            contents: "echo hi\n".to_owned(),
        }
    );
}

#[test]
fn read_only_system_refuses_mutations() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();

    let read_only = ReadOnlySystem::new(&system);
    let err = state
        .apply_all(&read_only, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap_err();
    assert!(err.to_string().contains("permission denied"));
    assert!(!test_fs.home_path(".profile").exists());
}

#[test]
fn include_set_gates_apply() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    test_fs.mkdir_source("dot_config");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::DIRS, UMASK)
        .unwrap();

    assert!(test_fs.home_path(".config").is_dir());
    assert!(!test_fs.home_path(".profile").exists());
}

#[test]
fn symlinks_in_the_source_are_unsupported() {
    let test_fs = TestFs::new();
    test_fs.write_source("dot_profile", "hello");
    std::os::unix::fs::symlink("dot_profile", test_fs.source.as_path().join("link")).unwrap();
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    let err = state.read().unwrap_err();
    assert!(err.to_string().contains("unsupported file type symlink"));
}

#[test]
fn read_errors_are_collected_across_the_walk() {
    let test_fs = TestFs::new();
    test_fs.write_source("foo", "a");
    test_fs.write_source("foo.tmpl", "b");
    test_fs.write_source("bar", "c");
    test_fs.write_source("bar.tmpl", "d");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    let err = state.read().unwrap_err();
    let message = err.to_string();
    // Both duplicates are reported in one pass, in target-name order.
    assert!(message.contains("bar: duplicate target"));
    assert!(message.contains("foo: duplicate target"));
}

#[test]
fn missing_source_directory_is_an_empty_state() {
    let temp = TempDir::new().unwrap();
    let source = AbsPath::new(temp.path().join("does/not/exist")).unwrap();
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, source).build();
    state.read().unwrap();
    assert_eq!(state.target_names().count(), 0);
}

#[test]
fn private_attribute_sets_restrictive_permissions() {
    let test_fs = TestFs::new();
    test_fs.mkdir_source("private_dot_ssh");
    test_fs.write_source("private_dot_ssh/config", "Host *\n");
    let system = RealSystem::new(MockPersistentState::new());
    let mut state = SourceState::builder(&system, test_fs.source.clone()).build();
    state.read().unwrap();
    state
        .apply_all(&system, &test_fs.home, IncludeSet::all(), UMASK)
        .unwrap();

    assert_mode(&test_fs.home_path(".ssh"), 0o700);
    assert_mode(&test_fs.home_path(".ssh/config"), 0o644);
}
