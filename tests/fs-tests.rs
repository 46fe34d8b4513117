//! Integration tests exercising `OcflRepo` against a local filesystem storage root.

mod common;

use std::convert::TryFrom;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use ocfl_engine::ocfl::{
    Diff, DigestAlgorithm, LayoutExtensionName, OcflRepo, RocflError, StorageLayout, VersionNum,
};

use common::{create_file, path};

fn new_repo(temp: &TempDir) -> OcflRepo {
    let layout = StorageLayout::new(LayoutExtensionName::HashedNTupleLayout, None).unwrap();
    OcflRepo::init_fs_repo(temp.path(), layout).unwrap()
}

fn create_and_commit(
    repo: &OcflRepo,
    object_id: &str,
    files: &[(&str, &str)],
    src: &TempDir,
) -> ocfl_engine::ocfl::Result<()> {
    repo.create_object(object_id, DigestAlgorithm::Sha512, "content", 0)?;

    for (name, content) in files {
        let file = create_file(src, name, content);
        repo.copy_files_external(object_id, &[file.path()], name, false, false)?;
    }

    repo.commit(object_id, Some("Peter"), Some("peter@example.com"), Some("initial commit"), None)
}

#[test]
fn create_object_and_commit_first_version() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "hello world")], &src).unwrap();

    let object = repo.get_object("o1", None).unwrap();

    assert_eq!("o1", object.id);
    assert_eq!(DigestAlgorithm::Sha512, object.digest_algorithm);
    assert_eq!(VersionNum::v1(), object.version_details.version_num);
    assert_eq!(Some("Peter".to_string()), object.version_details.user_name);
    assert_eq!(1, object.state.len());

    let details = object.state.get(&path("file1.txt")).unwrap();
    assert_eq!(DigestAlgorithm::Sha512, details.digest_algorithm);
}

#[test]
fn create_object_fails_when_id_already_exists() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "hello world")], &src).unwrap();

    match repo.create_object("o1", DigestAlgorithm::Sha512, "content", 0) {
        Err(RocflError::AlreadyExists(_)) => (),
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
}

#[test]
fn adding_identical_content_twice_dedups_within_a_version() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    repo.create_object("o1", DigestAlgorithm::Sha512, "content", 0)
        .unwrap();

    let file_a = create_file(&src, "a.txt", "same content");
    let file_b = create_file(&src, "b.txt", "same content");

    repo.copy_files_external("o1", &[file_a.path()], "a.txt", false, false)
        .unwrap();
    repo.copy_files_external("o1", &[file_b.path()], "b.txt", false, false)
        .unwrap();

    repo.commit("o1", None, None, None, None).unwrap();

    let object = repo.get_object("o1", None).unwrap();

    let digest_a = &object.state.get(&path("a.txt")).unwrap().digest;
    let digest_b = &object.state.get(&path("b.txt")).unwrap().digest;

    assert_eq!(digest_a, digest_b);
    // Both logical paths must resolve to the same staged content file.
    assert_eq!(
        object.state.get(&path("a.txt")).unwrap().content_path,
        object.state.get(&path("b.txt")).unwrap().content_path
    );
}

#[test]
fn overwrite_conflict_then_retry_with_overwrite_succeeds() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "version one")], &src).unwrap();

    let replacement = create_file(&src, "file1-v2.txt", "version two");

    match repo.copy_files_external("o1", &[replacement.path()], "file1.txt", false, false) {
        Err(RocflError::OverwriteConflict { object_id, path }) => {
            assert_eq!("o1", object_id);
            assert_eq!("file1.txt", path);
        }
        other => panic!("expected OverwriteConflict, got {:?}", other),
    }

    // The staged version must not retain a dangling reference to the rejected content.
    let staged = repo.get_staged_object("o1").unwrap();
    let digest_before = staged.state.get(&path("file1.txt")).unwrap().digest.clone();

    repo.copy_files_external("o1", &[replacement.path()], "file1.txt", false, true)
        .unwrap();
    repo.commit("o1", None, None, None, None).unwrap();

    let object = repo.get_object("o1", None).unwrap();
    let digest_after = &object.state.get(&path("file1.txt")).unwrap().digest;

    assert_ne!(&digest_before, digest_after);
}

#[test]
fn removing_a_path_and_committing_produces_a_deleted_diff() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(
        &repo,
        "o1",
        &[("file1.txt", "one"), ("file2.txt", "two")],
        &src,
    )
    .unwrap();

    repo.remove_files("o1", &["file2.txt"], false).unwrap();
    repo.commit("o1", None, None, None, None).unwrap();

    let object = repo.get_object("o1", None).unwrap();
    assert_eq!(1, object.state.len());
    assert!(object.state.contains_key(&path("file1.txt")));

    let diff = repo
        .diff("o1", Some(VersionNum::v1()), VersionNum::new(2))
        .unwrap();

    assert_eq!(1, diff.len());
    match &diff[0] {
        Diff::Deleted(p) => assert_eq!("file2.txt", p.as_str()),
        other => panic!("expected Deleted diff, got {:?}", other),
    }
}

#[test]
fn moving_a_file_within_an_object_renames_it() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("old/name.txt", "content")], &src).unwrap();

    repo.move_files_internal("o1", &["old/name.txt"], "new/name.txt", false)
        .unwrap();
    repo.commit("o1", None, None, None, None).unwrap();

    let object = repo.get_object("o1", None).unwrap();
    assert!(!object.state.contains_key(&path("old/name.txt")));
    assert!(object.state.contains_key(&path("new/name.txt")));
}

#[test]
fn reinstating_a_file_from_an_earlier_version() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "v1 content")], &src).unwrap();

    let v1_digest = repo
        .get_object("o1", None)
        .unwrap()
        .state
        .get(&path("file1.txt"))
        .unwrap()
        .digest
        .clone();

    // v2 overwrites the file
    let updated = create_file(&src, "file1-updated.txt", "v2 content");
    repo.copy_files_external("o1", &[updated.path()], "file1.txt", false, true)
        .unwrap();
    repo.commit("o1", None, None, None, None).unwrap();

    // v3 reinstates the v1 content by copying it forward from version 1
    repo.copy_files_internal(
        "o1",
        Some(VersionNum::v1()),
        &["file1.txt"],
        "file1.txt",
        false,
        true,
    )
    .unwrap();
    repo.commit("o1", None, None, None, None).unwrap();

    let object = repo.get_object("o1", None).unwrap();
    let v3_digest = &object.state.get(&path("file1.txt")).unwrap().digest;

    assert_eq!(&v1_digest, v3_digest);
}

#[test]
fn list_object_versions_returns_one_entry_per_commit() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "one")], &src).unwrap();

    let more = create_file(&src, "file2.txt", "two");
    repo.copy_files_external("o1", &[more.path()], "file2.txt", false, false)
        .unwrap();
    repo.commit("o1", None, None, Some("second"), None).unwrap();

    let versions = repo.list_object_versions("o1").unwrap();
    assert_eq!(2, versions.len());
    assert_eq!(VersionNum::v1(), versions[0].version_num);
    assert_eq!(VersionNum::new(2), versions[1].version_num);
}

#[test]
fn list_objects_finds_every_committed_object() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "one")], &src).unwrap();
    create_and_commit(&repo, "o2", &[("file1.txt", "two")], &src).unwrap();

    let mut ids: Vec<String> = repo
        .list_objects(None)
        .unwrap()
        .map(|details| details.id)
        .collect();
    ids.sort();

    assert_eq!(vec!["o1".to_string(), "o2".to_string()], ids);
}

#[test]
fn get_object_not_found() {
    let storage = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    match repo.get_object("bogus", None) {
        Err(RocflError::NotFound(_)) => (),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn purge_object_removes_it_entirely() {
    let storage = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    let repo = new_repo(&storage);

    create_and_commit(&repo, "o1", &[("file1.txt", "one")], &src).unwrap();
    repo.purge_object("o1").unwrap();

    match repo.get_object("o1", None) {
        Err(RocflError::NotFound(_)) => (),
        other => panic!("expected NotFound, got {:?}", other),
    }

    assert!(storage.child("235").path().exists().then(|| ()).is_none()
        || !storage.path().join("235").exists());
}
