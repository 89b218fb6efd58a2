//! Export tests
//!
//! Archive a package, extract it again, and check what survived the
//! exclusion policy.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use assetkit::bundle::{extract_archive, Archiver, EntryType, ExclusionPolicy};
use assetkit::resolve::{Resolver, RootSource};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Installable package with build by-products scattered through it
fn create_package(parent: &Path, name: &str) -> std::path::PathBuf {
    let root = parent.join(name);
    let payload = root.join(name);
    fs::create_dir_all(payload.join("resources/assets/config")).unwrap();
    fs::write(root.join("setup.cfg"), "[metadata]\nname = pkg1\n").unwrap();
    fs::write(payload.join("__init__.py"), "").unwrap();
    fs::write(payload.join("resources/assets/config/model.yaml"), "layers: 3\n").unwrap();

    // By-products at several depths
    fs::create_dir_all(root.join("build/lib")).unwrap();
    fs::write(root.join("build/lib/out.py"), "").unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist/pkg1-0.1.tar.gz"), "x").unwrap();
    fs::create_dir_all(root.join("pkg1.egg-info")).unwrap();
    fs::write(root.join("pkg1.egg-info/PKG-INFO"), "").unwrap();
    fs::create_dir_all(payload.join("__pycache__")).unwrap();
    fs::write(payload.join("__pycache__/mod.cpython-311.pyc"), "").unwrap();
    fs::create_dir_all(payload.join("resources/assets/__pycache__/deep")).unwrap();
    fs::write(payload.join("resources/assets/__pycache__/deep/x.txt"), "").unwrap();
    fs::write(payload.join("stale.pyc"), "").unwrap();
    root
}

fn relative_files(dir: &Path) -> BTreeSet<String> {
    WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_round_trip_reproduces_tree_minus_exclusions() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");
    let archive = tmp.path().join("pkg1.tar.gz");

    let listing = Archiver::default().archive(&root, &archive).unwrap();
    let out = tmp.path().join("out");
    extract_archive(&archive, &out).unwrap();

    let expected: BTreeSet<String> = [
        "pkg1/setup.cfg",
        "pkg1/pkg1/__init__.py",
        "pkg1/pkg1/resources/assets/config/model.yaml",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(relative_files(&out), expected);
    assert_eq!(listing.file_count(), 3);
    assert_eq!(
        fs::read_to_string(out.join("pkg1/pkg1/resources/assets/config/model.yaml")).unwrap(),
        "layers: 3\n"
    );
}

#[test]
fn test_excluded_subtrees_are_absent_from_listing() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");

    let listing = Archiver::default()
        .archive(&root, &tmp.path().join("pkg1.tar.gz"))
        .unwrap();

    for excluded in [
        "pkg1/build",
        "pkg1/dist",
        "pkg1/pkg1.egg-info",
        "pkg1/pkg1/__pycache__",
        "pkg1/pkg1/resources/assets/__pycache__",
    ] {
        assert!(!listing.contains_under(excluded), "{excluded} was archived");
    }
    assert!(listing.find_entry("pkg1/pkg1/stale.pyc").is_none());
    assert!(listing
        .entries
        .iter()
        .all(|e| e.path == "pkg1" || e.path.starts_with("pkg1/")));
    assert_eq!(
        listing.find_entry("pkg1/pkg1").map(|e| e.entry_type),
        Some(EntryType::Directory)
    );
}

#[test]
fn test_export_leaves_source_untouched() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");
    let before = relative_files(&root);

    Archiver::default()
        .archive(&root, &tmp.path().join("pkg1.tar.gz"))
        .unwrap();

    assert_eq!(relative_files(&root), before);
}

#[test]
fn test_payload_reference_exports_whole_package() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");

    let resolved = Resolver::default()
        .resolve(&root.join("pkg1").to_string_lossy())
        .unwrap();
    assert_eq!(resolved.source, RootSource::Parent);

    let listing = Archiver::default()
        .archive(&resolved.path, &tmp.path().join("pkg1.tar.gz"))
        .unwrap();
    assert!(listing.find_entry("pkg1/setup.cfg").is_some());
}

#[test]
fn test_installed_package_found_on_search_path() {
    let tmp = TempDir::new().unwrap();
    let site = tmp.path().join("site-packages");
    fs::create_dir_all(site.join("installed_pkg/resources")).unwrap();
    fs::write(site.join("installed_pkg/resources/a.txt"), "a").unwrap();

    let resolver = Resolver::new(vec!["setup.cfg".to_string()], vec![site.clone()]);
    let resolved = resolver.resolve("installed_pkg").unwrap();

    assert_eq!(resolved.name, "installed_pkg");
    assert_eq!(resolved.source, RootSource::Installed { location: site });
}

#[test]
fn test_custom_patterns_extend_defaults() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");
    fs::write(root.join("pkg1/notes.tmp"), "").unwrap();

    let policy = ExclusionPolicy::default().with_patterns(&["*.tmp"]).unwrap();
    let listing = Archiver::new(policy)
        .archive(&root, &tmp.path().join("pkg1.tar.gz"))
        .unwrap();

    assert!(listing.find_entry("pkg1/pkg1/notes.tmp").is_none());
    assert!(!listing.contains_under("pkg1/build"));
}

#[test]
fn test_repeated_exports_are_identical() {
    let tmp = TempDir::new().unwrap();
    let root = create_package(tmp.path(), "pkg1");

    let first = Archiver::default()
        .archive(&root, &tmp.path().join("a.tar.gz"))
        .unwrap();
    let second = Archiver::default()
        .archive(&root, &tmp.path().join("b.tar.gz"))
        .unwrap();

    assert_eq!(first.archive_sha256, second.archive_sha256);
    assert_eq!(
        fs::read(tmp.path().join("a.tar.gz")).unwrap(),
        fs::read(tmp.path().join("b.tar.gz")).unwrap()
    );
}
