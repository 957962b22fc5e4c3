mod common;

use slideforge::error::{AppError, ArchiveError};
use slideforge::services::ArchiveExtractor;
use tokio_test::{assert_err, assert_ok};

use common::build_zip;

#[tokio::test]
async fn test_traversal_entry_rejected_before_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("dest");
    let archive = build_zip(&[
        ("index.html", "<html><body>ok</body></html>"),
        ("../../evil", "pwned"),
    ]);

    let err = assert_err!(ArchiveExtractor::new().extract(archive, &dest).await);
    assert!(matches!(
        err,
        AppError::Archive(ArchiveError::PathTraversal { .. })
    ));

    assert!(!tmp.path().join("evil").exists());
    assert!(!dest.join("index.html").exists(), "校验失败时不应写入任何文件");
}

#[tokio::test]
async fn test_single_top_level_directory_becomes_root() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = build_zip(&[
        ("my-deck/index.html", "<html><body></body></html>"),
        ("my-deck/assets/style.css", "body {}"),
        ("__MACOSX/my-deck/._index.html", "junk"),
        ("my-deck/.DS_Store", "junk"),
    ]);

    let extracted = assert_ok!(ArchiveExtractor::new().extract(archive, tmp.path()).await);
    assert_eq!(extracted.root_dir, tmp.path().join("my-deck"));
    assert_eq!(extracted.files.len(), 2);
    assert!(!tmp.path().join("__MACOSX").exists());
    assert!(!tmp.path().join("my-deck/.DS_Store").exists());
}

#[tokio::test]
async fn test_mixed_top_level_keeps_destination_as_root() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = build_zip(&[
        ("index.html", "<html></html>"),
        ("assets/style.css", "body {}"),
    ]);

    let extracted = assert_ok!(ArchiveExtractor::new().extract(archive, tmp.path()).await);
    assert_eq!(extracted.root_dir, tmp.path());
}

#[tokio::test]
async fn test_archive_without_html_is_no_content() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = build_zip(&[("readme.txt", "hello"), ("img/logo.png", "png")]);

    let err = assert_err!(ArchiveExtractor::new().extract(archive, tmp.path()).await);
    assert!(matches!(err, AppError::Archive(ArchiveError::NoContent)));
}

#[tokio::test]
async fn test_bare_html_upload_saved_as_index() {
    let tmp = tempfile::tempdir().unwrap();
    let html = b"<!DOCTYPE html><html><body><section class=\"slide\"></section></body></html>";

    let extracted = assert_ok!(ArchiveExtractor::new().extract(html.to_vec(), tmp.path()).await);
    assert_eq!(extracted.root_dir, tmp.path());
    assert_eq!(
        std::fs::read(tmp.path().join("index.html")).unwrap(),
        html.to_vec()
    );
}

#[tokio::test]
async fn test_garbage_is_invalid_archive() {
    let tmp = tempfile::tempdir().unwrap();

    let err = assert_err!(
        ArchiveExtractor::new()
            .extract(b"definitely not an archive".to_vec(), tmp.path())
            .await
    );
    assert!(matches!(
        err,
        AppError::Archive(ArchiveError::InvalidArchive { .. })
    ));
}

#[tokio::test]
async fn test_entry_limit_enforced() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = build_zip(&[
        ("index.html", "<html></html>"),
        ("a.css", ""),
        ("b.css", ""),
    ]);

    let err = assert_err!(
        ArchiveExtractor::with_limits(2, 1024)
            .extract(archive, tmp.path())
            .await
    );
    assert!(matches!(
        err,
        AppError::Archive(ArchiveError::InvalidArchive { .. })
    ));
}
