//! エラーケーステスト
//!
//! 入力不備・形式不一致など実行全体を止めるエラーと、1件単位のスキップを検証

use photo_embed_common::{ItemKind, RunReport};
use photo_embed_rust::config::Config;
use photo_embed_rust::context::RunContext;
use photo_embed_rust::error::EmbedError;
use photo_embed_rust::pipeline::{self, MatchSettings};
use photo_embed_rust::{archive, reader, scanner};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::collect_images(Path::new("/nonexistent/path/12345"));
    assert!(matches!(result, Err(EmbedError::FolderNotFound(_))));
}

/// 画像のないフォルダは空のVec
#[test]
fn test_scan_folder_no_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("test.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("photo.mpo"), "x").unwrap();

    let images = scanner::collect_images(dir.path()).unwrap();
    assert!(images.is_empty());
}

/// 表ドキュメントが存在しない場合は何も展開しない
#[test]
fn test_missing_document() {
    let dir = tempdir().unwrap();
    let ctx = RunContext::create(&dir.path().join("work")).unwrap();
    let settings = MatchSettings::from_config(&Config::default());

    let archive = dir.path().join("batch-A1.zip");
    std::fs::write(&archive, b"PK").unwrap();

    let err = pipeline::run_match(&ctx, &dir.path().join("missing.xlsx"), &[archive], &settings)
        .unwrap_err();
    assert!(matches!(err, EmbedError::MissingRequiredFile(_)));
    assert!(std::fs::read_dir(ctx.extract_dir()).unwrap().next().is_none());
}

/// xlsx ではないファイル
#[test]
fn test_unreadable_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"definitely not a zip").unwrap();

    let keywords = reader::HeaderKeywords::from_config(&Config::default());
    let err = reader::read_document(&path, &keywords).unwrap_err();
    assert!(matches!(err, EmbedError::DocumentParse(_)));
}

/// アーカイブ指定なし
#[test]
fn test_no_archives() {
    let err = pipeline::check_archives(&[]).unwrap_err();
    assert!(matches!(err, EmbedError::MissingRequiredFile(_)));
}

/// rar / 未知の拡張子
#[test]
fn test_unsupported_archive_formats() {
    for name in ["a.rar", "b.RAR", "c.docx"] {
        let err = archive::check_supported(&PathBuf::from(name)).unwrap_err();
        assert!(
            matches!(err, EmbedError::UnsupportedArchiveFormat(_)),
            "{} should be rejected",
            name
        );
    }
}

/// 壊れたアーカイブはスキップとして記録され、実行は続く
#[test]
fn test_corrupt_archive_counts_as_skip() {
    let dir = tempdir().unwrap();
    let ctx = RunContext::create(&dir.path().join("work")).unwrap();
    let broken = dir.path().join("batch-X1.tar.gz");
    std::fs::write(&broken, b"not gzip").unwrap();

    let mut report = RunReport::default();
    let containers = pipeline::prepare_containers(
        &ctx,
        &[broken],
        photo_embed_common::ExtractionRule::FirstSeparator,
        &mut report,
    )
    .unwrap();

    assert!(containers.is_empty());
    assert_eq!(report.containers_processed, 1);
    assert_eq!(report.skipped_count(ItemKind::Archive), 1);
}

/// EmbedErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        EmbedError::Config("テスト設定エラー".to_string()),
        EmbedError::UnsupportedArchiveFormat("x.rar".to_string()),
        EmbedError::MissingRequiredFile("doc.xlsx".to_string()),
        EmbedError::DocumentParse("doc.xlsx".to_string()),
        EmbedError::PerItemEmbed {
            item: "1.jpg".to_string(),
            reason: "decode".to_string(),
        },
        EmbedError::ExcelGeneration("Excel生成エラー".to_string()),
        EmbedError::Package("sheet1.xml".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: EmbedError = io_err.into();

    assert!(matches!(err, EmbedError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

/// common::Errorからの変換（透過的エラー）
#[test]
fn test_common_error_conversion() {
    let common_err = photo_embed_common::Error::UnknownContainer("zz.zip".to_string());
    let err: EmbedError = common_err.into();

    assert!(matches!(err, EmbedError::Common(_)));
    assert!(format!("{}", err).contains("zz.zip"));
}
