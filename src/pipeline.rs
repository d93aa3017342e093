//! 処理パイプライン
//!
//! 照合モード: アーカイブ展開 → 画像収集 → 表読み込み → 照合 →（補正）→ 埋め込み
//! フォルダ一覧モード: 展開 → 画像フォルダ列挙 → 新規ドキュメントに書き出し
//!
//! 1件単位の失敗（アーカイブ1つ、画像1枚、フォルダ1つ）は RunReport に積んで続行する。
//! 入力なし・表が読めない・保存できない場合は実行全体をエラーで終える。

use crate::archive;
use crate::config::Config;
use crate::context::RunContext;
use crate::convert;
use crate::error::{EmbedError, Result};
use crate::export::{self, EncodedImage, FolderRow, RowImages};
use crate::reader::{self, DocumentData, HeaderKeywords};
use crate::scanner;
use indicatif::{ProgressBar, ProgressStyle};
use photo_embed_common::identifier::strip_extension;
use photo_embed_common::{
    extract_key, match_rows, strip_non_ascii, Container, Correction, ExtractionRule, ItemKind,
    ItemOutcome, Error, MatchOptions, MatchResult, RunReport,
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// 照合の設定
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub rule: ExtractionRule,
    pub options: MatchOptions,
    pub keywords: HeaderKeywords,
}

impl MatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rule: config.extraction_rule,
            options: MatchOptions {
                partial_fallback: config.partial_fallback,
            },
            keywords: HeaderKeywords::from_config(config),
        }
    }
}

/// 照合までの結果
#[derive(Debug, Clone)]
pub struct MatchRun {
    pub document: DocumentData,
    pub containers: Vec<Container>,
    pub results: Vec<MatchResult>,
    pub report: RunReport,
}

fn progress_bar(len: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("  {msg} {wide_bar:.cyan/dim} {pos}/{len} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar.set_message(message.to_string());
    bar
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 全アーカイブの形式を先に確認する（1つでも未対応なら何も展開しない）
pub fn check_archives(archives: &[PathBuf]) -> Result<()> {
    if archives.is_empty() {
        return Err(EmbedError::MissingRequiredFile("アーカイブが指定されていません".into()));
    }
    for path in archives {
        archive::check_supported(path)?;
    }
    Ok(())
}

/// アーカイブを `ctx` の展開先に展開する
///
/// 戻り値はアーカイブごとの展開先。壊れたアーカイブはスキップとして記録する。
fn extract_archives(
    ctx: &RunContext,
    archives: &[PathBuf],
    report: &mut RunReport,
) -> Vec<Option<PathBuf>> {
    archives
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = file_name_of(path);
            let dest = ctx.extract_dir().join(i.to_string()).join(strip_extension(&name));
            let outcome = match archive::extract(path, &dest) {
                Ok(()) => ItemOutcome::Done(dest),
                Err(e) => {
                    log::warn!("展開失敗 {}: {}", name, e);
                    ItemOutcome::skipped(name, e)
                }
            };
            report.record(ItemKind::Archive, outcome)
        })
        .collect()
}

/// アーカイブをコンテナにする（照合モード）
pub fn prepare_containers(
    ctx: &RunContext,
    archives: &[PathBuf],
    rule: ExtractionRule,
    report: &mut RunReport,
) -> Result<Vec<Container>> {
    check_archives(archives)?;
    report.containers_processed += archives.len();

    let extracted = extract_archives(ctx, archives, report);

    let mut containers = Vec::new();
    for (path, dest) in archives.iter().zip(extracted) {
        let Some(dest) = dest else {
            continue;
        };
        let name = file_name_of(path);
        let outcome = match scanner::collect_images(&dest) {
            Ok(images) => ItemOutcome::Done(images),
            Err(e) => {
                log::warn!("画像収集エラー {}: {}", name, e);
                ItemOutcome::skipped(name.clone(), e)
            }
        };
        let Some(images) = report.record(ItemKind::Archive, outcome) else {
            continue;
        };

        let key = extract_key(&name, rule);
        log::debug!("container {} key={} images={}", name, key, images.len());
        containers.push(Container { name, key, images });
    }

    Ok(containers)
}

/// 表を読み込みアーカイブと照合する
pub fn run_match(
    ctx: &RunContext,
    document: &Path,
    archives: &[PathBuf],
    settings: &MatchSettings,
) -> Result<MatchRun> {
    let mut report = RunReport::default();

    // 表が読めなければ展開せずに終える
    let data = reader::read_document(document, &settings.keywords)?;
    let containers = prepare_containers(ctx, archives, settings.rule, &mut report)?;
    let results = match_rows(&data.rows, &containers, settings.options);

    Ok(MatchRun {
        document: data,
        containers,
        results,
        report,
    })
}

/// 補正ファイル（JSON配列）を読み込む
pub fn load_corrections(path: &Path) -> Result<Vec<Correction>> {
    let content = std::fs::read_to_string(path)?;
    Ok(Correction::list_from_json(&content)?)
}

/// 画像をPNG化（失敗は None として位置を保つ）
fn encode_images(
    paths: &[PathBuf],
    progress: &ProgressBar,
    report: &mut RunReport,
) -> Vec<Option<EncodedImage>> {
    convert::convert_all(paths, Some(progress))
        .into_iter()
        .zip(paths.iter())
        .map(|(outcome, path)| {
            if let ItemOutcome::Skipped { reason, .. } = &outcome {
                log::warn!("画像変換エラー {}: {}", path.display(), reason);
            }
            report
                .record(ItemKind::Image, outcome)
                .map(|png| EncodedImage {
                    source: path.display().to_string(),
                    png,
                })
        })
        .collect()
}

/// 照合結果に従って画像を埋め込み、`output` に保存する
///
/// 確定した結果（コンテナあり）のみ対象。同じコンテナが複数行に対応する場合は各行に置く。
pub fn embed_matches(
    document: &Path,
    output: &Path,
    results: &[MatchResult],
    containers: &[Container],
    report: &mut RunReport,
    show_progress: bool,
) -> Result<()> {
    let used: Vec<usize> = {
        let mut seen = HashSet::new();
        results
            .iter()
            .filter_map(|r| r.container.as_ref())
            .map(|c| c.index)
            .filter(|index| seen.insert(*index))
            .collect()
    };

    let total: usize = used
        .iter()
        .filter_map(|&index| containers.get(index))
        .map(|c| c.images.len())
        .sum();
    let progress = progress_bar(total as u64, "PNG変換", show_progress);

    let mut encoded: BTreeMap<usize, Vec<Option<EncodedImage>>> = BTreeMap::new();
    for &index in &used {
        let container = containers
            .get(index)
            .ok_or_else(|| Error::UnknownContainer(format!("#{}", index)))?;
        encoded.insert(index, encode_images(&container.images, &progress, report));
    }
    progress.finish_and_clear();

    let rows: Vec<RowImages> = results
        .iter()
        .filter_map(|r| {
            let container = r.container.as_ref()?;
            Some(RowImages {
                row: r.row.row_index,
                images: encoded.get(&container.index).cloned().unwrap_or_default(),
            })
        })
        .collect();

    let summary = export::embed_in_place(document, output, &rows)?;

    // 1枚も置けなかったコンテナは数えない
    let embedded = encoded
        .values()
        .filter(|images| images.iter().any(Option::is_some))
        .count();
    report.images_placed += summary.images_placed;
    report.containers_matched += embedded;

    log::info!(
        "Placed {} images for {} of {} containers (base column {})",
        summary.images_placed,
        embedded,
        used.len(),
        summary.base_column
    );

    Ok(())
}

/// フォルダ一覧の入力（アーカイブまたは展開済みフォルダ）から画像フォルダを集める
///
/// 同じ名前（ASCII化後）のフォルダは最初のものだけ使う。
pub fn collect_folder_rows_input(
    ctx: &RunContext,
    inputs: &[PathBuf],
    report: &mut RunReport,
) -> Result<Vec<(String, Vec<PathBuf>)>> {
    if inputs.is_empty() {
        return Err(EmbedError::MissingRequiredFile("入力が指定されていません".into()));
    }

    let archives: Vec<PathBuf> = inputs.iter().filter(|p| !p.is_dir()).cloned().collect();
    if !archives.is_empty() {
        check_archives(&archives)?;
    }
    let mut extracted = extract_archives(ctx, &archives, report).into_iter();

    let mut roots = Vec::new();
    for input in inputs {
        if input.is_dir() {
            roots.push(input.clone());
        } else if let Some(Some(dest)) = extracted.next() {
            roots.push(dest);
        }
    }

    let mut seen = HashSet::new();
    let mut dirs = Vec::new();
    for root in roots {
        let found = match scanner::collect_image_dirs(&root) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("フォルダ読み込みエラー {}: {}", root.display(), e);
                report.record::<()>(
                    ItemKind::Directory,
                    ItemOutcome::skipped(root.display().to_string(), e),
                );
                continue;
            }
        };
        for dir in found {
            let identifier = strip_non_ascii(&dir.name);
            if !seen.insert(identifier.clone()) {
                log::info!("重複フォルダをスキップ: {}", dir.path.display());
                continue;
            }
            let outcome = match scanner::images_in_dir(&dir.path) {
                Ok(images) => ItemOutcome::Done(images),
                Err(e) => {
                    log::warn!("フォルダ読み込みエラー {}: {}", dir.path.display(), e);
                    ItemOutcome::skipped(dir.path.display().to_string(), e)
                }
            };
            if let Some(images) = report.record(ItemKind::Directory, outcome) {
                dirs.push((identifier, images));
            }
        }
    }

    Ok(dirs)
}

/// フォルダ一覧モード
pub fn run_folder_export(
    ctx: &RunContext,
    inputs: &[PathBuf],
    output: &Path,
    show_progress: bool,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let dirs = collect_folder_rows_input(ctx, inputs, &mut report)?;
    report.containers_processed = dirs.len();

    let total: usize = dirs.iter().map(|(_, images)| images.len()).sum();
    let progress = progress_bar(total as u64, "PNG変換", show_progress);

    let rows: Vec<FolderRow> = dirs
        .into_iter()
        .map(|(identifier, images)| FolderRow {
            identifier,
            images: encode_images(&images, &progress, &mut report),
        })
        .collect();
    progress.finish_and_clear();

    export::write_folder_document(&rows, output, &mut report)?;
    report.containers_matched = rows.iter().filter(|r| !r.images.is_empty()).count();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_check_archives_rejects_before_extracting() {
        let archives = vec![PathBuf::from("a.zip"), PathBuf::from("b.rar")];
        assert!(matches!(
            check_archives(&archives),
            Err(EmbedError::UnsupportedArchiveFormat(_))
        ));
    }

    #[test]
    fn test_load_corrections_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrections.json");
        std::fs::write(&path, r#"[{"row": 3, "container": "AB123"}, {"row": 4, "container": null}]"#)
            .unwrap();

        let list = load_corrections(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].row, 3);
        assert_eq!(list[0].container.as_deref(), Some("AB123"));
        assert!(list[1].container.is_none());

        assert!(matches!(
            load_corrections(&dir.path().join("missing.json")),
            Err(EmbedError::Io(_))
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_corrections(&path),
            Err(EmbedError::Common(Error::Json(_)))
        ));
    }

    #[test]
    fn test_check_archives_requires_input() {
        assert!(matches!(
            check_archives(&[]),
            Err(EmbedError::MissingRequiredFile(_))
        ));
    }

    #[test]
    fn test_corrupt_archive_is_skipped() {
        let base = tempdir().unwrap();
        let ctx = RunContext::create(base.path()).unwrap();
        let broken = base.path().join("batch-AB1.zip");
        std::fs::write(&broken, b"not a zip").unwrap();

        let mut report = RunReport::default();
        let containers =
            prepare_containers(&ctx, &[broken], ExtractionRule::FirstSeparator, &mut report).unwrap();
        assert!(containers.is_empty());
        assert_eq!(report.containers_processed, 1);
        assert_eq!(report.skipped_count(ItemKind::Archive), 1);
    }

    #[test]
    fn test_out_of_range_container_is_unknown_container() {
        let base = tempdir().unwrap();
        let results = vec![MatchResult {
            row: photo_embed_common::RowRecord {
                row_index: 2,
                ..Default::default()
            },
            container: Some(photo_embed_common::ContainerRef {
                index: 5,
                name: "gone.zip".into(),
            }),
            status: photo_embed_common::MatchStatus::Manual,
        }];

        let mut report = RunReport::default();
        let err = embed_matches(
            &base.path().join("doc.xlsx"),
            &base.path().join("out.xlsx"),
            &results,
            &[],
            &mut report,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EmbedError::Common(Error::UnknownContainer(_))));
    }

    #[test]
    fn test_folder_input_dedup_by_ascii_name() {
        let base = tempdir().unwrap();
        let ctx = RunContext::create(base.path()).unwrap();
        let root = base.path().join("upload");
        for name in ["SKU1", "SKU1图片", "SKU2"] {
            std::fs::create_dir_all(root.join(name)).unwrap();
            std::fs::write(root.join(name).join("1.jpg"), b"x").unwrap();
        }

        let mut report = RunReport::default();
        let dirs = collect_folder_rows_input(&ctx, &[root], &mut report).unwrap();
        let names: Vec<&str> = dirs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["SKU1", "SKU2"]);
    }
}
