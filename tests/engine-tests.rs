use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use rocfl::ocfl::{
    Diff, DigestAlgorithm, InventoryPath, LayoutExtensionName, OcflRepo, RocflError, StorageLayout,
    VersionNum,
};

fn new_repo() -> (TempDir, OcflRepo) {
    let tmp = TempDir::new().unwrap();
    let layout = StorageLayout::new(LayoutExtensionName::HashedNTupleLayout, None).unwrap();
    let repo = OcflRepo::init_fs_repo(tmp.path(), layout).unwrap();
    (tmp, repo)
}

/// Computes the on-disk root of an object using a freshly built copy of the default storage
/// layout, independent of whatever `OcflRepo` instance is under test.
fn object_root(tmp: &TempDir, object_id: &str) -> PathBuf {
    let layout = StorageLayout::new(LayoutExtensionName::HashedNTupleLayout, None).unwrap();
    tmp.path().join(layout.map_object_id(object_id).unwrap())
}

fn stage_file(repo: &OcflRepo, tmp: &TempDir, object_id: &str, name: &str, content: &str) {
    let src = tmp.child(name);
    src.write_str(content).unwrap();
    repo.copy_files_external(object_id, &[src.path().to_path_buf()], "/", false)
        .unwrap();
}

#[test]
fn create_stage_and_commit_first_version() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file1.txt", "hello world");
    repo.commit(
        "obj-1",
        Some("Alice"),
        Some("mailto:alice@example.com"),
        Some("initial commit"),
        None,
    )
    .unwrap();

    let object = repo.get_object("obj-1", None).unwrap();
    assert_eq!("obj-1", object.id);
    assert_eq!(
        VersionNum::try_from(1).unwrap(),
        object.version_details.version_num
    );
    assert_eq!(1, object.state.len());

    let details = repo.get_object_details("obj-1", None).unwrap();
    assert_eq!(
        Some("initial commit".to_string()),
        details.version_details.message
    );

    assert!(predicate::path::exists().eval(&object_root(&tmp, "obj-1").join("v1/inventory.json")));
}

#[test]
fn commit_second_version_with_modified_file() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version one");
    repo.commit("obj-1", Some("Alice"), None, Some("v1"), None)
        .unwrap();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap_err();

    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version two");
    repo.commit("obj-1", Some("Alice"), None, Some("v2"), None)
        .unwrap();

    let versions = repo.list_object_versions("obj-1").unwrap();
    assert_eq!(2, versions.len());
    assert_eq!(VersionNum::try_from(1).unwrap(), versions[0].version_num);
    assert_eq!(VersionNum::try_from(2).unwrap(), versions[1].version_num);

    let diff = repo
        .diff("obj-1", None, VersionNum::try_from(2).unwrap())
        .unwrap();
    assert_eq!(1, diff.len());
    match &diff[0] {
        Diff::Modified(path) => assert_eq!("file1.txt", path.as_str()),
        other => panic!("expected Modified, got {:?}", other),
    }
}

#[test]
fn remove_file_then_commit() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "keep.txt", "keep me");
    stage_file(&repo, &tmp, "obj-1", "drop.txt", "drop me");
    repo.commit("obj-1", None, None, None, None).unwrap();

    repo.remove_files("obj-1", &["drop.txt"], false).unwrap();
    repo.commit("obj-1", None, None, None, None).unwrap();

    let object = repo.get_object("obj-1", None).unwrap();
    assert_eq!(1, object.state.len());
    assert!(object.state.keys().any(|p| p.as_str() == "keep.txt"));
}

#[test]
fn list_objects_returns_every_committed_object() {
    let (tmp, repo) = new_repo();

    for id in ["obj-1", "obj-2", "obj-3"] {
        repo.create_object(id, DigestAlgorithm::Sha512, "content", 0)
            .unwrap();
        stage_file(&repo, &tmp, id, "file.txt", id);
        repo.commit(id, None, None, None, None).unwrap();
    }

    let mut ids: Vec<String> = repo
        .list_objects(None)
        .unwrap()
        .map(|details| details.id)
        .collect();
    ids.sort_unstable();

    assert_eq!(vec!["obj-1", "obj-2", "obj-3"], ids);
}

#[test]
fn purge_object_removes_it_from_the_repository() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let root = object_root(&tmp, "obj-1");
    assert!(predicate::path::exists().eval(&root));

    repo.purge_object("obj-1").unwrap();

    assert!(repo.get_object("obj-1", None).is_err());
    assert!(predicate::path::missing().eval(&root));
}

#[test]
fn validate_freshly_committed_object_has_no_errors() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let result = repo.validate_object("obj-1", true).unwrap();
    assert!(
        !result.has_errors(),
        "unexpected errors: {:?}",
        result.errors()
    );
}

#[test]
fn get_missing_object_fails_with_not_found() {
    let (_tmp, repo) = new_repo();
    match repo.get_object("does-not-exist", None) {
        Err(RocflError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn contains_object_reflects_commit_and_purge() {
    let (tmp, repo) = new_repo();

    assert!(!repo.contains_object("obj-1").unwrap());

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    // Staged, but not yet committed -- shouldn't show up as existing in the main repo.
    assert!(!repo.contains_object("obj-1").unwrap());

    stage_file(&repo, &tmp, "obj-1", "file.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();
    assert!(repo.contains_object("obj-1").unwrap());

    repo.purge_object("obj-1").unwrap();
    assert!(!repo.contains_object("obj-1").unwrap());
}

#[test]
fn rollback_to_version_restores_earlier_content_and_deletes_later_versions() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version one");
    repo.commit("obj-1", None, None, Some("v1"), None).unwrap();

    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version two");
    repo.commit("obj-1", None, None, Some("v2"), None).unwrap();

    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version three");
    repo.commit("obj-1", None, None, Some("v3"), None).unwrap();

    let root = object_root(&tmp, "obj-1");
    assert!(predicate::path::exists().eval(&root.join("v3")));

    repo.rollback_to_version("obj-1", VersionNum::try_from(1).unwrap())
        .unwrap();

    let object = repo.get_object("obj-1", None).unwrap();
    assert_eq!(
        VersionNum::try_from(1).unwrap(),
        object.version_details.version_num
    );

    assert!(predicate::path::missing().eval(&root.join("v2")));
    assert!(predicate::path::missing().eval(&root.join("v3")));

    let dest = TempDir::new().unwrap();
    repo.export_object("obj-1", dest.path()).unwrap();
    let content = fs::read_to_string(dest.child("file1.txt").path()).unwrap();
    assert_eq!("version one", content);
}

#[test]
fn rollback_to_version_rejects_version_that_is_not_older_than_head() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "file1.txt", "version one");
    repo.commit("obj-1", None, None, Some("v1"), None).unwrap();

    match repo.rollback_to_version("obj-1", VersionNum::try_from(1).unwrap()) {
        Err(RocflError::IllegalArgument(_)) => {}
        other => panic!("expected IllegalArgument, got {:?}", other),
    }
}

#[test]
fn export_object_writes_head_version_files_to_disk() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "a.txt", "file a");
    stage_file(&repo, &tmp, "obj-1", "nested/b.txt", "file b");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let dest = TempDir::new().unwrap();
    repo.export_object("obj-1", dest.path()).unwrap();

    dest.child("a.txt").assert("file a");
    dest.child("nested/b.txt").assert("file b");
}

#[test]
fn export_version_reconstructs_an_earlier_version() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "a.txt", "first");
    repo.commit("obj-1", None, None, None, None).unwrap();

    stage_file(&repo, &tmp, "obj-1", "a.txt", "second");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let dest = TempDir::new().unwrap();
    repo.export_version("obj-1", VersionNum::try_from(1).unwrap(), dest.path())
        .unwrap();

    dest.child("a.txt").assert("first");
}

#[test]
fn import_object_moves_an_exported_object_tree_back_into_the_repository() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "a.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let root = object_root(&tmp, "obj-1");
    let holding = TempDir::new().unwrap();

    fs_extra::dir::copy(
        &root,
        holding.path(),
        &fs_extra::dir::CopyOptions {
            content_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    repo.purge_object("obj-1").unwrap();
    assert!(!repo.contains_object("obj-1").unwrap());

    repo.import_object("obj-1", holding.path()).unwrap();

    assert!(repo.contains_object("obj-1").unwrap());
    let object = repo.get_object("obj-1", None).unwrap();
    assert_eq!(1, object.state.len());
}

#[test]
fn import_object_fails_if_the_object_already_exists() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "a.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();

    let root = object_root(&tmp, "obj-1");
    let holding = TempDir::new().unwrap();

    fs_extra::dir::copy(
        &root,
        holding.path(),
        &fs_extra::dir::CopyOptions {
            content_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    match repo.import_object("obj-1", holding.path()) {
        Err(RocflError::ObjectOutOfSync(_)) => {}
        other => panic!("expected ObjectOutOfSync, got {:?}", other),
    }
}

#[test]
fn purge_mutable_head_on_an_object_without_one_is_a_noop() {
    let (tmp, repo) = new_repo();

    repo.create_object("obj-1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();
    stage_file(&repo, &tmp, "obj-1", "a.txt", "hello");
    repo.commit("obj-1", None, None, None, None).unwrap();

    repo.purge_mutable_head("obj-1").unwrap();

    let object = repo.get_object("obj-1", None).unwrap();
    assert_eq!(
        VersionNum::try_from(1).unwrap(),
        object.version_details.version_num
    );
}
