//! Archive reader and writer integration tests.

mod common;

use std::fs;

use common::{build_tar, read_tar};
use unspool::{ArchiveReader, ArchiveWriter, UnspoolError};

#[test]
fn reader_lists_and_extracts_members() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("videos.tar");
    build_tar(
        &archive,
        &[
            ("clip1.mp4", "3"),
            ("docs/readme.txt", "hello"),
            ("nested/clip2.mp4", "5"),
        ],
    );

    let mut reader = ArchiveReader::open(&archive).expect("open archive");
    assert_eq!(
        reader.list(),
        ["clip1.mp4", "docs/readme.txt", "nested/clip2.mp4"]
    );
    assert!(reader.contains("nested/clip2.mp4"));
    assert_eq!(reader.member_size("docs/readme.txt"), Some(5));

    let stage = tempfile::tempdir().unwrap();
    let staged = reader
        .extract("nested/clip2.mp4", stage.path())
        .expect("extract member");
    assert_eq!(staged, stage.path().join("clip2.mp4"));
    assert_eq!(fs::read_to_string(&staged).unwrap(), "5");

    // Earlier member after a later one.
    let staged = reader.extract("clip1.mp4", stage.path()).unwrap();
    assert_eq!(fs::read_to_string(staged).unwrap(), "3");
    reader.close();
}

#[test]
fn reader_rejects_missing_and_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.tar");
    assert!(matches!(
        ArchiveReader::open(&missing),
        Err(UnspoolError::ArchiveOpen { .. })
    ));

    let corrupt = dir.path().join("corrupt.tar");
    fs::write(&corrupt, vec![b'x'; 1024]).unwrap();
    assert!(matches!(
        ArchiveReader::open(&corrupt),
        Err(UnspoolError::ArchiveOpen { .. })
    ));

    assert!(matches!(
        ArchiveReader::open(dir.path()),
        Err(UnspoolError::ArchiveOpen { .. })
    ));

    let empty = dir.path().join("empty.tar");
    fs::write(&empty, b"").unwrap();
    let error = ArchiveReader::open(&empty).unwrap_err();
    assert!(matches!(error, UnspoolError::ArchiveOpen { .. }));
    assert!(error.to_string().contains("too short"));

    let truncated = dir.path().join("truncated.tar");
    fs::write(&truncated, vec![0u8; 100]).unwrap();
    assert!(matches!(
        ArchiveReader::open(&truncated),
        Err(UnspoolError::ArchiveOpen { .. })
    ));
}

#[test]
fn extracting_unknown_member_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("a.tar");
    build_tar(&archive, &[("clip.mp4", "1")]);

    let stage = tempfile::tempdir().unwrap();
    let mut reader = ArchiveReader::open(&archive).unwrap();
    let error = reader.extract("other.mp4", stage.path()).unwrap_err();
    assert!(matches!(
        error,
        UnspoolError::MemberNotFound { ref member, .. } if member == "other.mp4"
    ));
    assert!(common::is_empty_dir(stage.path()));
}

#[test]
fn writer_adds_directories_recursively_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    fs::create_dir_all(&frames).unwrap();
    fs::write(frames.join("00000001.jpg"), b"b").unwrap();
    fs::write(frames.join("00000000.jpg"), b"a").unwrap();
    let loose = dir.path().join("notes.txt");
    fs::write(&loose, b"n").unwrap();

    let output = dir.path().join("out.tar");
    let mut writer = ArchiveWriter::create(&output, false).unwrap();
    writer.add_path(&frames, "clip1").unwrap();
    writer.add_path(&loose, "extra/notes.txt").unwrap();
    assert_eq!(writer.close().unwrap(), output);

    let reader = ArchiveReader::open(&output).unwrap();
    assert_eq!(
        reader.list(),
        ["clip1/00000000.jpg", "clip1/00000001.jpg", "extra/notes.txt"]
    );

    let contents = read_tar(&output);
    assert_eq!(contents["clip1/00000000.jpg"], b"a");
    assert_eq!(contents["clip1/00000001.jpg"], b"b");
}

#[test]
fn writer_respects_overwrite_policy() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.tar");
    fs::write(&output, b"keep me").unwrap();

    let error = ArchiveWriter::create(&output, false).unwrap_err();
    assert!(matches!(error, UnspoolError::ArchiveCreate { .. }));
    assert_eq!(fs::read(&output).unwrap(), b"keep me");

    let writer = ArchiveWriter::create(&output, true).expect("overwrite allowed");
    writer.close().unwrap();
    assert!(ArchiveReader::open(&output).unwrap().list().is_empty());
}
