//! 照合モード: 読み込んだドキュメントの既存列の右側に画像を追加する
//!
//! 元ファイルは書き換えず、出力先に保存する。

use super::folder::EncodedImage;
use crate::error::Result;
use crate::xlsx::sheet::SheetEdit;
use crate::xlsx::{Placement, XlsxPackage};
use photo_embed_common::layout::{image_header, IMAGE_COL_WIDTH, IMAGE_ROW_HEIGHT_PT};
use std::path::Path;

/// 1行に置く画像
#[derive(Debug, Clone)]
pub struct RowImages {
    /// シート上の行番号（1始まり）
    pub row: u32,
    /// 画像。None は変換失敗（列は詰めない）
    pub images: Vec<Option<EncodedImage>>,
}

/// 配置結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedSummary {
    pub images_placed: usize,
    /// 最初の画像列（1始まり）
    pub base_column: u32,
}

/// 行ごとの画像から配置とシート変更を組み立てる
fn plan(rows: &[RowImages], base_column: u32, max_row: u32) -> (SheetEdit, Vec<Placement>) {
    let mut edit = SheetEdit::default();
    let mut placements = Vec::new();

    for row in rows {
        for (ordinal, image) in row.images.iter().enumerate() {
            let Some(image) = image else {
                continue;
            };
            let col = base_column + ordinal as u32;
            edit.headers
                .entry(col)
                .or_insert_with(|| image_header(ordinal + 1));
            edit.column_widths.insert(col, IMAGE_COL_WIDTH);
            placements.push(Placement {
                row: row.row,
                col,
                png: image.png.clone(),
            });
        }
    }

    if !placements.is_empty() {
        let last_row = placements
            .iter()
            .map(|p| p.row)
            .max()
            .unwrap_or(0)
            .max(max_row);
        for r in 2..=last_row {
            edit.row_heights.insert(r, IMAGE_ROW_HEIGHT_PT);
        }
    }

    (edit, placements)
}

/// 画像を埋め込んで `output` に保存
pub fn embed_in_place(document: &Path, output: &Path, rows: &[RowImages]) -> Result<EmbedSummary> {
    let mut package = XlsxPackage::open(document)?;
    let sheet = package.active_sheet()?;
    let info = package.sheet_info(&sheet)?;

    // 既存の最終列の次から
    let base_column = info.max_col + 1;
    let (edit, placements) = plan(rows, base_column, info.max_row);

    log::info!(
        "Embedding {} images into '{}' from column {}",
        placements.len(),
        sheet.name,
        crate::xlsx::column_letter(base_column)
    );

    package.embed_images(&sheet, edit, &placements)?;
    package.save(output)?;

    Ok(EmbedSummary {
        images_placed: placements.len(),
        base_column,
    })
}
